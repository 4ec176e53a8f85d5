//! Composition root: declarative `runtime.json` → registered services.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    application::{
        ApplicationError,
        ports::ResourceCatalog,
        providers::Provider,
        services::{ComponentRegistry, ServiceCollection},
    },
    domain::{Configuration, RUNTIME_CONFIGURATION_RESOURCE},
    error::BotResult,
};

/// Register the bot's services into `services`.
///
/// Registers the catalog and registry, reads `runtime.json` from the
/// catalog, decodes it with `registry` and lets it configure the
/// collection. Nothing is resolved here; missing storage or root dialog
/// surface when the bot is first requested.
///
/// Composition happens once per collection; a second call fails with
/// `AlreadyComposed`.
#[instrument(skip_all)]
pub fn add_bot_core(
    services: &mut ServiceCollection,
    configuration: &Configuration,
    catalog: Arc<dyn ResourceCatalog>,
    registry: Arc<ComponentRegistry>,
) -> BotResult<()> {
    if services.is_composed() {
        return Err(ApplicationError::AlreadyComposed.into());
    }
    services.mark_composed();

    let resource = catalog.get_resource(RUNTIME_CONFIGURATION_RESOURCE)?;
    let runtime = registry.decode_runtime(&resource.json()?)?;

    services.add_catalog(move |_| Ok(catalog.clone()));
    let shared = registry.clone();
    services.add_registry(move |_| Ok(shared.clone()));

    runtime.configure_services(services, configuration)?;
    info!(
        registrations = services.registrations().len(),
        "Bot services composed"
    );
    Ok(())
}

// ── tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ServiceKind;
    use crate::domain::Resource;
    use serde_json::json;

    struct OneResource(Option<Resource>);

    impl ResourceCatalog for OneResource {
        fn get_resource(&self, id: &str) -> BotResult<Resource> {
            self.0
                .clone()
                .filter(|r| r.id() == id)
                .ok_or_else(|| ApplicationError::ResourceNotFound { id: id.into() }.into())
        }

        fn contains(&self, id: &str) -> bool {
            self.0.as_ref().is_some_and(|r| r.id() == id)
        }

        fn resource_ids(&self) -> Vec<String> {
            self.0.iter().map(|r| r.id().to_owned()).collect()
        }
    }

    fn runtime(value: serde_json::Value) -> Arc<dyn ResourceCatalog> {
        Arc::new(OneResource(Some(Resource::new(
            RUNTIME_CONFIGURATION_RESOURCE,
            value.to_string(),
        ))))
    }

    #[test]
    fn missing_runtime_resource_is_named() {
        let mut services = ServiceCollection::new();
        let err = add_bot_core(
            &mut services,
            &Configuration::empty(),
            Arc::new(OneResource(None)),
            Arc::new(ComponentRegistry::with_core_components()),
        )
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "Could not find resource 'runtime.json'");
        assert_eq!(err.param_name(), Some("runtime.json"));
    }

    #[test]
    fn registration_follows_declared_order() {
        let mut services = ServiceCollection::new();
        add_bot_core(
            &mut services,
            &Configuration::empty(),
            runtime(json!({
                "$kind": "Microsoft.RuntimeConfiguration",
                "adapters": [{ "$kind": "Microsoft.BotCoreAdapter" }],
                "credentials": { "$kind": "Microsoft.DeclarativeCredentials" },
                "channel": { "$kind": "Microsoft.DeclarativeChannel" }
            })),
            Arc::new(ComponentRegistry::with_core_components()),
        )
        .unwrap();

        use ServiceKind::*;
        assert_eq!(
            services.registrations(),
            [
                Catalog,
                Registry,
                AdapterOptions,
                Adapter,
                Channel,
                Credentials,
                SkillConversationIdFactory,
                SkillClient,
                SkillHandler,
                ConversationState,
                UserState,
                Authentication,
                BotOptions,
                Bot,
            ]
        );
    }

    #[test]
    fn composing_twice_fails() {
        let mut services = ServiceCollection::new();
        let registry = Arc::new(ComponentRegistry::with_core_components());
        let catalog = runtime(json!({}));
        add_bot_core(&mut services, &Configuration::empty(), catalog.clone(), registry.clone())
            .unwrap();
        let err = add_bot_core(&mut services, &Configuration::empty(), catalog, registry)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::error::BotError::Application(ApplicationError::AlreadyComposed)
        ));
    }

    #[test]
    fn bot_without_storage_fails_on_first_request() {
        let mut services = ServiceCollection::new();
        add_bot_core(
            &mut services,
            &Configuration::empty(),
            runtime(json!({ "rootDialog": "root.dialog" })),
            Arc::new(ComponentRegistry::with_core_components()),
        )
        .unwrap();
        let provider = services.build();
        let err = provider.bot().err().unwrap();
        assert_eq!(err.to_string(), "Required service not registered: Storage");
    }
}
