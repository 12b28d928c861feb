//! Destructuring and binding

use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;

use super::methods::get_property;
use super::ops::iterate;
use super::{BindingKind, Env, Interpreter};
use crate::core::ast::{Expr, Pattern};
use crate::error::{ScriptError, ScriptResult};
use crate::value::Value;

impl Interpreter {
    /// Bind `value` to `pattern`. With a `kind` the names are declared in
    /// the current scope, without one they are assigned.
    pub(super) fn bind_pattern<'a>(
        &'a self,
        pattern: &'a Pattern,
        value: Value,
        kind: Option<BindingKind>,
        env: &'a Env,
    ) -> BoxFuture<'a, ScriptResult<()>> {
        async move {
            match pattern {
                Pattern::Ident(name) => match kind {
                    Some(kind) => env.scope.declare(name, value, kind),
                    None => env.scope.assign(name, value),
                },
                Pattern::Member(target) => self.assign_member(target, value, env).await,
                Pattern::Object { props, rest } => {
                    if value.is_nullish() {
                        return Err(ScriptError::type_error(format!(
                            "Cannot destructure '{value}' as it is {}.",
                            value.to_display_string()
                        )));
                    }
                    for prop in props {
                        let item = get_property(&value, &prop.key)?;
                        let item = self
                            .apply_default(item, prop.default.as_ref(), &prop.target, env)
                            .await?;
                        self.bind_pattern(&prop.target, item, kind, env).await?;
                    }
                    if let Some(rest) = rest {
                        let remaining: IndexMap<String, Value> = match &value {
                            Value::Object(object) => object
                                .lock()
                                .iter()
                                .filter(|(key, _)| !props.iter().any(|p| *p.key == **key))
                                .map(|(key, value)| (key.clone(), value.clone()))
                                .collect(),
                            _ => IndexMap::new(),
                        };
                        let target = Pattern::Ident(rest.clone());
                        self.bind_pattern(&target, Value::object(remaining), kind, env)
                            .await?;
                    }
                    Ok(())
                }
                Pattern::Array { items, rest } => {
                    let mut values = iterate(&value)?.into_iter();
                    for item in items {
                        let next = values.next().unwrap_or_default();
                        if let Some(item) = item {
                            let next = self
                                .apply_default(next, item.default.as_ref(), &item.target, env)
                                .await?;
                            self.bind_pattern(&item.target, next, kind, env).await?;
                        }
                    }
                    if let Some(rest) = rest {
                        let remaining = Value::array(values.collect());
                        self.bind_pattern(rest, remaining, kind, env).await?;
                    }
                    Ok(())
                }
            }
        }
        .boxed()
    }

    async fn apply_default(
        &self,
        value: Value,
        default: Option<&Expr>,
        target: &Pattern,
        env: &Env,
    ) -> ScriptResult<Value> {
        match (value, default) {
            (Value::Undefined, Some(default)) => self.eval_named(default, target, env).await,
            (value, _) => Ok(value),
        }
    }
}
