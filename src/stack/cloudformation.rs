// Copyright (c) 2025 - Cowboy AI, Inc.
//! AWS CloudFormation stack service

use async_trait::async_trait;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{Capability, OnFailure as CfnOnFailure, Parameter};
use aws_sdk_cloudformation::Client;
use tracing::debug;

use super::{OnFailure, StackRequest, StackService, StackServiceError, StackStatus};

/// Stack service backed by CloudFormation
#[derive(Debug, Clone)]
pub struct CloudFormationService {
    client: Client,
}

impl CloudFormationService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

/// Map a provider error onto the convergence vocabulary
///
/// CloudFormation reports missing stacks and empty updates as
/// `ValidationError` with a distinguishing message.
fn classify<E, R>(err: SdkError<E, R>, stack_name: &str) -> StackServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().unwrap_or_default().to_string();
    let message = err.message().unwrap_or_default().to_string();

    match code.as_str() {
        "ValidationError" if message.contains("does not exist") => {
            StackServiceError::NotFound(stack_name.to_string())
        }
        "ValidationError" if message.contains("No updates are to be performed") => {
            StackServiceError::NoChanges
        }
        "ValidationError" => StackServiceError::Validation(message),
        "AlreadyExistsException" => StackServiceError::AlreadyExists(stack_name.to_string()),
        _ => StackServiceError::Remote(DisplayErrorContext(err).to_string()),
    }
}

fn parameters(request: &StackRequest) -> Vec<Parameter> {
    request
        .parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn capabilities(request: &StackRequest) -> Vec<Capability> {
    request
        .capabilities
        .iter()
        .map(|c| Capability::from(c.as_str()))
        .collect()
}

fn on_failure(policy: OnFailure) -> CfnOnFailure {
    match policy {
        OnFailure::DoNothing => CfnOnFailure::DoNothing,
        OnFailure::Rollback => CfnOnFailure::Rollback,
        OnFailure::Delete => CfnOnFailure::Delete,
    }
}

#[async_trait]
impl StackService for CloudFormationService {
    async fn validate_template(&self, body: &str) -> Result<(), StackServiceError> {
        debug!(bytes = body.len(), "cloudformation validate_template");
        self.client
            .validate_template()
            .template_body(body)
            .send()
            .await
            .map_err(|e| classify(e, ""))?;
        Ok(())
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<(), StackServiceError> {
        debug!(stack = %request.stack_name, "cloudformation create_stack");
        self.client
            .create_stack()
            .stack_name(&request.stack_name)
            .template_url(&request.template_url)
            .set_parameters(Some(parameters(request)))
            .set_capabilities(Some(capabilities(request)))
            .on_failure(on_failure(request.on_failure))
            .send()
            .await
            .map_err(|e| classify(e, &request.stack_name))?;
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<(), StackServiceError> {
        debug!(stack = %request.stack_name, "cloudformation update_stack");
        self.client
            .update_stack()
            .stack_name(&request.stack_name)
            .template_url(&request.template_url)
            .set_parameters(Some(parameters(request)))
            .set_capabilities(Some(capabilities(request)))
            .send()
            .await
            .map_err(|e| classify(e, &request.stack_name))?;
        Ok(())
    }

    async fn describe_stack_status(
        &self,
        stack_name: &str,
    ) -> Result<Option<StackStatus>, StackServiceError> {
        let output = match self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                return match classify(err, stack_name) {
                    StackServiceError::NotFound(_) => Ok(None),
                    other => Err(other),
                }
            }
        };

        Ok(output
            .stacks()
            .first()
            .and_then(|stack| stack.stack_status())
            .map(|status| StackStatus::new(status.as_str())))
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), StackServiceError> {
        debug!(stack = stack_name, "cloudformation delete_stack");
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| classify(e, stack_name))?;
        Ok(())
    }
}
