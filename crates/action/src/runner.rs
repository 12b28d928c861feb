//! Build, send and decode in one place

use serde_json::{Map, Value};
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::error::{ActionError, ActionResult};
use crate::model::ActionDefinition;
use crate::process::ResponseProcessor;
use crate::request::{BuildOptions, CallContext, PreparedRequest, build_request};

/// Everything needed to turn an action call into a JSON result.
#[derive(Debug, Clone)]
pub struct ActionRunner {
    dispatcher: Dispatcher,
    processor: ResponseProcessor,
    options: BuildOptions,
}

impl ActionRunner {
    pub fn new(dispatcher: Dispatcher, processor: ResponseProcessor, options: BuildOptions) -> Self {
        Self {
            dispatcher,
            processor,
            options,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the request without sending it.
    pub fn prepare(
        &self,
        action: &ActionDefinition,
        params: &Map<String, Value>,
        ctx: CallContext<'_>,
    ) -> ActionResult<PreparedRequest> {
        build_request(action, params, ctx, &self.options)
    }

    /// Send a prepared request and decode the answer.
    ///
    /// A status of 300 or more becomes [`ActionError::Downstream`] carrying
    /// the decoded body.
    pub async fn send(
        &self,
        action: &ActionDefinition,
        request: &PreparedRequest,
    ) -> ActionResult<Value> {
        let outcome = self.dispatcher.dispatch(request).await?;
        let body = self.processor.process(&outcome, action).await;
        if outcome.is_error {
            debug!(action = %request.action, status = %outcome.status, "downstream API returned an error");
            return Err(ActionError::Downstream {
                action: request.action.clone(),
                status: outcome.status,
                body,
            });
        }
        Ok(body)
    }

    /// [`prepare`](Self::prepare) followed by [`send`](Self::send).
    pub async fn call(
        &self,
        action: &ActionDefinition,
        params: &Map<String, Value>,
        ctx: CallContext<'_>,
    ) -> ActionResult<Value> {
        let request = self.prepare(action, params, ctx)?;
        self.send(action, &request).await
    }
}
