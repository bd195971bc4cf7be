//! Routing of PathSet objects to their handler chain

use anyhow::Result;
use framework::{BasicResourceSet, CustomResourceDefinition, ResourceRouter};
use reconcile::BackoffConfig;

use crate::config::Config;
use crate::object::{EntrySet, GROUP, KIND, PLURAL, PathSet, VERSION};
use crate::resource;

pub type PathSetRouter = ResourceRouter<PathSet, EntrySet, EntrySet>;

/// The PathSet definition ensured at boot
pub fn crd() -> CustomResourceDefinition {
    CustomResourceDefinition::new(GROUP, VERSION, KIND, PLURAL)
}

/// `opkit.dev/v1` PathSets: symlinks first, then files, each retried
pub fn v1_resource_set(retry: &BackoffConfig) -> Result<BasicResourceSet<PathSet, EntrySet, EntrySet>> {
    let resources = reconcile::retry_resource::wrap(resource::handlers(), &retry.factory())?;
    let set = BasicResourceSet::new(resources, PathSet::is_supported)?
        .with_init_ctx(|ctx, obj: &PathSet| Ok(ctx.with_meta("object", obj.name())));
    Ok(set)
}

pub fn build(config: &Config) -> Result<PathSetRouter> {
    Ok(ResourceRouter::new(vec![Box::new(v1_resource_set(&config.retry.backoff())?)])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framework::Error;
    use reconcile::Context;

    fn object(api_version: &str) -> PathSet {
        let mut object = PathSet::from_toml(
            r#"
api_version = "opkit.dev/v1"
kind = "PathSet"

[metadata]
name = "demo"

[spec]
root = "/srv/demo"
"#,
        )
        .unwrap();
        object.api_version = api_version.to_string();
        object
    }

    #[test]
    fn test_routes_v1_objects() {
        let router = build(&Config::default()).unwrap();
        let set = router.resource_set(&object("opkit.dev/v1")).unwrap();

        let names: Vec<_> = set.resources().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["retry", "retry"]);
        let underlying: Vec<_> = set
            .resources()
            .iter()
            .map(|r| r.underlying().name())
            .collect();
        assert_eq!(underlying, vec!["symlink", "file"]);
    }

    #[test]
    fn test_rejects_other_versions() {
        let router = build(&Config::default()).unwrap();
        assert!(matches!(
            router.resource_set(&object("opkit.dev/v2")),
            Err(Error::NoResourceSet)
        ));
    }

    #[test]
    fn test_init_ctx_tags_object() {
        let router = build(&Config::default()).unwrap();
        let obj = object("opkit.dev/v1");
        let set = router.resource_set(&obj).unwrap();

        let ctx = set.init_ctx(Context::background(), &obj).unwrap();
        assert_eq!(ctx.meta("object"), Some("demo"));
    }

    #[test]
    fn test_crd_name() {
        assert_eq!(crd().name(), "pathsets.opkit.dev");
        assert_eq!(crd().api_version(), crate::object::api_version());
    }
}
