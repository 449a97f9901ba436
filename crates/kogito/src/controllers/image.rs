use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use tokio::time::Duration;
use tracing::*;

use super::deployer::{service_namespace, Pass};
use crate::api::external::image_stream::{
    ImageLookupPolicy, ImageStreamSpec, TagImportPolicy, TagReference, TagReferencePolicy, TagSource,
};
use crate::api::external::ImageStream;
use crate::api::v1beta1::KogitoService;
use crate::client::ResourceClient;
use crate::framework::ResourceSet;
use crate::util::errors::{Error, ErrorWithRequeue, Result, StdError};

pub const IMAGE_STREAM_API_VERSION: &str = "image.openshift.io/v1";
pub const IMAGE_STREAM_KIND: &str = "ImageStream";

/// Requeue while an image stream tag waits for its import.
pub const IMAGE_IMPORT_REQUEUE: Duration = Duration::from_secs(10);

const DEFAULT_TAG: &str = "latest";

/// An image reference split into the parts the image stream needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Last path segment of the repository
    pub name: String,
    pub tag: String,
}

/// Parses `registry/org/name:tag`. Digest references are not tracked by
/// image streams and yield `None`.
pub fn parse_image(image: &str) -> Option<ImageRef> {
    if image.is_empty() || image.contains('@') {
        return None;
    }
    let last = image.rsplit_once('/').map_or(image, |(_, last)| last);
    let (name, tag) = last.split_once(':').unwrap_or((last, DEFAULT_TAG));
    if name.is_empty() || tag.is_empty() {
        return None;
    }
    Some(ImageRef {
        name: name.to_string(),
        tag: tag.to_string(),
    })
}

/// Image from the spec, falling back to the default of the service type.
pub fn requested_image<S: KogitoService>(service: &S) -> Result<String> {
    service
        .service_spec()
        .image
        .clone()
        .filter(|image| !image.is_empty())
        .or_else(|| service.definition().default_image.map(str::to_string))
        .ok_or_else(|| Error::configuration(format!("{} has no image", service.name_any())))
}

fn tag_reference(image: &str, tag: &str, insecure: bool) -> TagReference {
    TagReference {
        name: tag.to_string(),
        from: Some(TagSource {
            kind: "DockerImage".to_string(),
            name: image.to_string(),
        }),
        import_policy: Some(TagImportPolicy {
            insecure: Some(insecure),
        }),
        reference_policy: Some(TagReferencePolicy {
            type_: "Local".to_string(),
        }),
    }
}

/// The stream the service needs: the deployed one with the tag and the
/// owner added when missing, or a new one.
pub fn build_image_stream<S: KogitoService>(
    service: &S,
    image: &str,
    image_ref: &ImageRef,
    deployed: Option<&ImageStream>,
) -> Result<ImageStream> {
    let owner = service
        .owner_ref(&())
        .ok_or_else(|| StdError::MetadataMissing(format!("{} has no uid", service.name_any())))?;
    let insecure = service.service_spec().insecure_image_registry;

    let mut stream = match deployed {
        Some(deployed) => deployed.clone(),
        None => ImageStream {
            metadata: ObjectMeta {
                name: Some(image_ref.name.clone()),
                namespace: Some(service_namespace(service)?),
                ..Default::default()
            },
            spec: ImageStreamSpec {
                lookup_policy: Some(ImageLookupPolicy { local: true }),
                tags: Vec::new(),
            },
            status: None,
        },
    };
    if !stream.has_tag(&image_ref.tag) {
        stream.spec.tags.push(tag_reference(image, &image_ref.tag, insecure));
    }
    let owners = stream.metadata.owner_references.get_or_insert_with(Vec::new);
    if !owners.iter().any(|o| o.uid == owner.uid) {
        owners.push(owner);
    }
    Ok(stream)
}

/// Resolves the image the workload runs.
///
/// Without the ImageStream API the requested image is used as is.
pub async fn reconcile<C: ResourceClient, S: KogitoService>(client: &C, service: &S, pass: &mut Pass) -> Result<()> {
    let image = requested_image(service)?;
    let image_ref = match parse_image(&image) {
        Some(image_ref) if client.has_api(IMAGE_STREAM_API_VERSION, IMAGE_STREAM_KIND).await? => image_ref,
        _ => {
            pass.image = Some(image.clone());
            pass.observed.image = Some(image);
            return Ok(());
        }
    };

    let namespace = service_namespace(service)?;
    let deployed = client.fetch::<ImageStream>(&namespace, &image_ref.name).await?;
    let requested = build_image_stream(service, &image, &image_ref, deployed.as_ref())?;
    pass.apply(
        client,
        service,
        ResourceSet::new().with(vec![requested]),
        ResourceSet::new().with(deployed.clone().into_iter().collect()),
    )
    .await?;

    let resolved = deployed
        .as_ref()
        .and_then(|stream| stream.resolved_reference(&image_ref.tag))
        .map(str::to_string);
    match resolved {
        Some(reference) => {
            debug!("Image {} resolved to {}", image, reference);
            pass.image = Some(reference);
            pass.observed.image = Some(image);
            Ok(())
        }
        None => Err(Error::ErrorWithRequeue(ErrorWithRequeue::new(
            StdError::ResourceNotReady(format!(
                "image stream tag {}:{} is not imported yet",
                image_ref.name, image_ref.tag
            )),
            IMAGE_IMPORT_REQUEUE,
        ))),
    }
}
