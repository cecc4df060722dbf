//! Contract modules: bind handler implementations to contract operations and
//! register them as routes

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use ferrule_contract::{
    ConfigError, Contract, ContractHandler, ContractOperation, Implementation, OutputStructure,
};

use crate::engine::EngineResponse;
use crate::pipeline;
use crate::router::{RouteError, RouteHandler, RouteRequest, RouteSignature, Router};

/// Module-wide defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Used by operations that do not declare an output structure
    pub output_structure: OutputStructure,
    /// Validate successful results against the operation's output schema
    pub validate_responses: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            output_structure: OutputStructure::Raw,
            validate_responses: true,
        }
    }
}

impl ModuleConfig {
    pub fn output_structure(mut self, structure: OutputStructure) -> Self {
        self.output_structure = structure;
        self
    }

    pub fn validate_responses(mut self, enable: bool) -> Self {
        self.validate_responses = enable;
        self
    }
}

/// One operation, its implementation and the module settings it runs with
pub struct HandlerBinding {
    name: String,
    operation: Arc<ContractOperation>,
    handler: Arc<dyn ContractHandler>,
    output_structure: OutputStructure,
    validate_responses: bool,
}

impl HandlerBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operation(&self) -> &ContractOperation {
        &self.operation
    }

    pub fn handler(&self) -> &dyn ContractHandler {
        self.handler.as_ref()
    }

    /// Effective structure after per-operation overrides
    pub fn output_structure(&self) -> OutputStructure {
        self.output_structure
    }

    pub fn validates_responses(&self) -> bool {
        self.validate_responses
    }
}

impl std::fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("name", &self.name)
            .field("method", self.operation.method())
            .field("path", &self.operation.path().as_str())
            .field("output_structure", &self.output_structure)
            .finish()
    }
}

#[async_trait]
impl RouteHandler for HandlerBinding {
    async fn call(
        &self,
        request: RouteRequest<'_>,
        response: &mut dyn EngineResponse,
    ) -> Result<(), RouteError> {
        pipeline::run(self, request, response).await
    }
}

/// Named set of handler bindings over one contract
///
/// ```rust,no_run
/// use ferrule_contract::{Contract, ContractOperation, implement};
/// use ferrule_http::{ContractModule, Router};
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let contract = Contract::builder()
///     .operation("ping", ContractOperation::get("/ping")?)
///     .build()?;
///
/// let module = ContractModule::builder("health", &contract)
///     .implement(implement("ping", |_input| async { Ok(json!({"pong": true})) }))
///     .build()?;
///
/// let mut router = Router::default();
/// assert_eq!(module.register(&mut router)?, 1);
/// assert_eq!(module.register(&mut router)?, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ContractModule {
    name: String,
    bindings: Vec<Arc<HandlerBinding>>,
}

impl ContractModule {
    pub fn builder(name: impl Into<String>, contract: &Contract) -> ContractModuleBuilder {
        ContractModuleBuilder {
            name: name.into(),
            contract: contract.clone(),
            config: ModuleConfig::default(),
            implementations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bindings(&self) -> impl Iterator<Item = &HandlerBinding> {
        self.bindings.iter().map(Arc::as_ref)
    }

    /// `(method, path template)` pairs this module registers
    pub fn route_signature(&self) -> RouteSignature {
        self.bindings
            .iter()
            .map(|binding| {
                let operation = binding.operation();
                (
                    operation.method().as_str().to_string(),
                    operation.path().to_string(),
                )
            })
            .collect()
    }

    /// Register every binding as a route
    ///
    /// Returns the number of routes added. Registering a module whose name
    /// and routes are already mounted on this router adds nothing; the same
    /// name with different routes is [`ConfigError::DuplicateModule`].
    /// Registration is all-or-nothing: if any route conflicts, no route of
    /// this module is added.
    pub fn register(&self, router: &mut Router) -> Result<usize, ConfigError> {
        let signature = self.route_signature();
        if let Some(mounted) = router.mounted_routes(&self.name) {
            if *mounted != signature {
                return Err(ConfigError::DuplicateModule(self.name.clone()));
            }
            debug!("Module '{}' already registered, skipping", self.name);
            return Ok(0);
        }

        for binding in &self.bindings {
            let operation = binding.operation();
            router.check_route(operation.method(), operation.path())?;
        }

        for binding in &self.bindings {
            let operation = binding.operation();
            router.route(
                operation.method().clone(),
                operation.path().clone(),
                binding.clone(),
            )?;
        }
        router.mark_mounted(&self.name, signature);

        info!(
            "Module '{}' registered {} route(s)",
            self.name,
            self.bindings.len()
        );
        Ok(self.bindings.len())
    }
}

/// Builder for [`ContractModule`]
pub struct ContractModuleBuilder {
    name: String,
    contract: Contract,
    config: ModuleConfig,
    implementations: Vec<Implementation>,
}

impl ContractModuleBuilder {
    pub fn config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn output_structure(mut self, structure: OutputStructure) -> Self {
        self.config.output_structure = structure;
        self
    }

    pub fn implement(mut self, implementation: Implementation) -> Self {
        self.implementations.push(implementation);
        self
    }

    /// Validate the implementation table against the contract
    ///
    /// Unknown or repeated operation names fail here, before any request is
    /// served. Contract operations without an implementation are skipped.
    pub fn build(self) -> Result<ContractModule, ConfigError> {
        let mut seen = HashSet::new();
        for implementation in &self.implementations {
            let operation = implementation.operation();
            if !self.contract.contains(operation) {
                return Err(ConfigError::UnknownOperation {
                    module: self.name.clone(),
                    operation: operation.to_string(),
                });
            }
            if !seen.insert(operation.to_string()) {
                return Err(ConfigError::DuplicateImplementation {
                    module: self.name.clone(),
                    operation: operation.to_string(),
                });
            }
        }

        let mut bindings = Vec::with_capacity(self.implementations.len());
        for (name, operation) in self.contract.operations() {
            let Some(implementation) = self
                .implementations
                .iter()
                .find(|implementation| implementation.operation() == name)
            else {
                warn!(
                    "Module '{}' does not implement operation '{}', skipping",
                    self.name, name
                );
                continue;
            };

            bindings.push(Arc::new(HandlerBinding {
                name: name.to_string(),
                operation: operation.clone(),
                handler: implementation.handler(),
                output_structure: operation.effective_output_structure(self.config.output_structure),
                validate_responses: self.config.validate_responses,
            }));
        }

        Ok(ContractModule {
            name: self.name,
            bindings,
        })
    }
}
