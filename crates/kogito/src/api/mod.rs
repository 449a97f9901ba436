pub mod external;
pub mod v1beta1;
