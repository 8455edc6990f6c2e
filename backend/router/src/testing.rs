//! In-memory providers for router tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use intentforge_core::{
    InvocationError, OperationDescriptor, ParamType, ProviderEndpoint, ProviderSession,
    SessionFactory,
};

pub(crate) fn expense_operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("record_expense", "Record one expense")
            .with_param("date", ParamType::String, Some("YYYY-MM-DD"), true)
            .with_param("amount", ParamType::Number, None, true)
            .with_param("category", ParamType::String, None, true)
            .with_param("note", ParamType::String, None, false),
        OperationDescriptor::new("list_expenses", "List expenses in an inclusive date range")
            .with_param("start_date", ParamType::String, Some("YYYY-MM-DD"), true)
            .with_param("end_date", ParamType::String, Some("YYYY-MM-DD"), true),
    ]
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    pub connects: Vec<String>,
    pub lists: Vec<String>,
    pub invocations: Vec<(String, String, Map<String, Value>)>,
    pub closes: Vec<String>,
}

#[derive(Clone, Default)]
pub(crate) struct StubProvider {
    operations: Vec<OperationDescriptor>,
    unreachable: bool,
    hang_connect: bool,
    hang_list: bool,
    hang_invoke: bool,
    invoke_error: Option<String>,
}

impl StubProvider {
    pub fn with_operations(operations: Vec<OperationDescriptor>) -> Self {
        Self {
            operations,
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn hanging_connect(mut self) -> Self {
        self.hang_connect = true;
        self
    }

    pub fn hanging_list(mut self) -> Self {
        self.hang_list = true;
        self
    }

    pub fn hanging_invoke(mut self) -> Self {
        self.hang_invoke = true;
        self
    }

    pub fn failing_invoke(mut self, detail: impl Into<String>) -> Self {
        self.invoke_error = Some(detail.into());
        self
    }
}

#[derive(Default)]
pub(crate) struct StubFactory {
    providers: IndexMap<String, StubProvider>,
    journal: Arc<Mutex<Journal>>,
}

impl StubFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, provider: StubProvider) -> Self {
        self.providers.insert(name.to_string(), provider);
        self
    }

    pub fn endpoints(&self) -> Vec<ProviderEndpoint> {
        self.providers
            .keys()
            .map(|name| ProviderEndpoint::new(name.clone(), format!("http://stub.invalid/{name}/mcp")))
            .collect()
    }

    pub fn journal(&self) -> Journal {
        self.journal.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionFactory for StubFactory {
    async fn connect(&self, endpoint: &ProviderEndpoint) -> Result<Box<dyn ProviderSession>> {
        self.journal
            .lock()
            .unwrap()
            .connects
            .push(endpoint.name.clone());
        let spec = self
            .providers
            .get(&endpoint.name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no stub named {}", endpoint.name))?;
        if spec.unreachable {
            anyhow::bail!("connection refused ({})", endpoint.url);
        }
        if spec.hang_connect {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(Box::new(StubSession {
            provider: endpoint.name.clone(),
            spec,
            journal: self.journal.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct StubSession {
    provider: String,
    spec: StubProvider,
    journal: Arc<Mutex<Journal>>,
    closed: AtomicBool,
}

#[async_trait]
impl ProviderSession for StubSession {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn list_operations(&self) -> Result<Vec<OperationDescriptor>> {
        self.journal.lock().unwrap().lists.push(self.provider.clone());
        if self.spec.hang_list {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self.spec.operations.clone())
    }

    async fn invoke(
        &self,
        operation: &str,
        arguments: Map<String, Value>,
    ) -> std::result::Result<Value, InvocationError> {
        self.journal.lock().unwrap().invocations.push((
            self.provider.clone(),
            operation.to_string(),
            arguments.clone(),
        ));
        if self.spec.hang_invoke {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(detail) = &self.spec.invoke_error {
            return Err(InvocationError(detail.clone()));
        }
        Ok(json!({ "operation": operation, "stored": arguments }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.journal.lock().unwrap().closes.push(self.provider.clone());
        }
        Ok(())
    }
}
