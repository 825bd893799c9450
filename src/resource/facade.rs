//! Resource façade: binds query parameters to a schema, a provider, and the
//! Filter/PatchOp engines (RFC 7644 §3).

use super::list_response::{ListParams, ListResponse, SortOrder};
use super::provider::{EgressResult, RequestContext, ResourceProvider};
use crate::error::{ScimError, ScimResult};
use crate::filter::{AttributeCaseResolver, Filter};
use crate::patch;
use crate::schema::{Direction, SchemaDefinition};
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

/// Raw query parameters as a host would parse them off the wire, before
/// compilation into [`Filter`]s (RFC 7644 §3.4.2.2, §3.9).
#[derive(Debug, Clone, Default)]
pub struct ResourceParams {
    pub id: Option<String>,
    pub filter: Option<String>,
    pub attributes: Option<String>,
    pub excluded_attributes: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub start_index: Option<i64>,
    pub count: Option<i64>,
}

pub struct Resource<'a> {
    resource_type: String,
    schema: &'a SchemaDefinition,
    provider: Arc<dyn ResourceProvider>,
    basepath: Option<String>,
    id: Option<String>,
    filter: Option<Filter>,
    projection: Option<Filter>,
    list_params: ListParams,
}

impl<'a> Resource<'a> {
    /// `allow_filter` is `false` for resources that forbid filtering
    /// (Schema, ResourceType, ServiceProviderConfig).
    pub fn new(
        resource_type: impl Into<String>,
        schema: &'a SchemaDefinition,
        provider: Arc<dyn ResourceProvider>,
        basepath: Option<String>,
        params: ResourceParams,
        allow_filter: bool,
    ) -> ScimResult<Self> {
        if !allow_filter && params.filter.as_deref().is_some_and(|f| !f.trim().is_empty()) {
            return Err(ScimError::invalid_value(format!(
                "{} does not support filtering",
                resource_type.into()
            )));
        }

        let filter = params.filter.as_deref().map(Filter::parse).transpose()?;
        let projection = build_projection(params.attributes.as_deref(), params.excluded_attributes.as_deref())?;
        let sort_order = params.sort_order.as_deref().map(SortOrder::parse).transpose()?;

        Ok(Self {
            resource_type: resource_type.into(),
            schema,
            provider,
            basepath,
            id: params.id,
            filter,
            projection,
            list_params: ListParams {
                sort_by: params.sort_by,
                sort_order,
                start_index: params.start_index,
                count: params.count,
            },
        })
    }

    fn ctx(&self) -> RequestContext {
        RequestContext {
            resource_type: self.resource_type.clone(),
            id: self.id.clone(),
            filter: self.filter.clone(),
        }
    }

    fn coerce_out(&self, data: &Value) -> ScimResult<Value> {
        self.schema.coerce(
            data,
            Direction::Out,
            self.basepath.as_deref(),
            None,
            self.projection.as_ref(),
        )
    }

    /// Single read (`id` set) or list read (RFC 7644 §3.4.1, §3.4.2).
    pub async fn read(&self) -> ScimResult<Value> {
        debug!("{} read (id={:?})", self.resource_type, self.id);
        let ctx = self.ctx();
        let outcome = self.provider.egress(&ctx).await.map_err(|e| self.map_error(e))?;
        match outcome {
            EgressResult::Single(Some(doc)) => self.coerce_out(&doc),
            EgressResult::Single(None) => Err(ScimError::not_found(&self.resource_type, self.id.clone().unwrap_or_default())),
            EgressResult::Many(items) => {
                let filtered: Vec<&Value> = match &self.filter {
                    Some(filter) if !filter.is_empty() => {
                        filter.matches(&items, Some(self.schema as &dyn AttributeCaseResolver))
                    }
                    _ => items.iter().collect(),
                };
                let coerced: ScimResult<Vec<Value>> = filtered.into_iter().map(|v| self.coerce_out(v)).collect();
                let list = ListResponse::build(coerced?, &self.list_params, None)?;
                Ok(list.to_envelope())
            }
        }
    }

    /// Create (`id` absent) or update (`id` present) (RFC 7644 §3.3, §3.5.1).
    pub async fn write(&self, instance: &Value) -> ScimResult<Value> {
        if !instance.is_object() {
            return Err(ScimError::invalid_syntax("resource body must be a JSON object"));
        }
        debug!(
            "{} {} (id={:?})",
            if self.id.is_some() { "update" } else { "create" },
            self.resource_type,
            self.id
        );
        let ctx = self.ctx();
        let existing = if self.id.is_some() {
            match self.provider.egress(&ctx).await.map_err(|e| self.map_error(e))? {
                EgressResult::Single(doc) => doc,
                EgressResult::Many(_) => None,
            }
        } else {
            None
        };

        let coerced_in = self
            .schema
            .coerce(instance, Direction::In, self.basepath.as_deref(), existing.as_ref(), None)?;
        let committed = self
            .provider
            .ingress(&ctx, coerced_in, existing)
            .await
            .map_err(|e| self.map_error(e))?;
        self.coerce_out(&committed)
    }

    /// Apply a PatchOp envelope (RFC 7644 §3.5.2).
    pub async fn patch(&self, message: &Value) -> ScimResult<Value> {
        let Some(id) = &self.id else {
            return Err(ScimError::invalid_value("patch requires an id"));
        };
        debug!("{} patch (id={id})", self.resource_type);
        let ctx = self.ctx();
        let baseline = match self.provider.egress(&ctx).await.map_err(|e| self.map_error(e))? {
            EgressResult::Single(Some(doc)) => doc,
            EgressResult::Single(None) => return Err(ScimError::not_found(&self.resource_type, id.clone())),
            EgressResult::Many(_) => return Err(ScimError::internal("egress returned a collection for a single id")),
        };

        match patch::apply(&baseline, message, self.schema)? {
            None => self.coerce_out(&baseline),
            Some(updated) => {
                let committed = self
                    .provider
                    .ingress(&ctx, updated, Some(baseline))
                    .await
                    .map_err(|e| self.map_error(e))?;
                self.coerce_out(&committed)
            }
        }
    }

    /// Delete (RFC 7644 §3.6).
    pub async fn dispose(&self) -> ScimResult<()> {
        if self.id.is_none() {
            return Err(ScimError::invalid_value("dispose requires an id"));
        }
        let ctx = self.ctx();
        self.provider.degress(&ctx).await.map_err(|e| self.map_error(e))
    }

    /// Non-SCIM handler failures become `404` when an id was given, `500`
    /// otherwise; SCIM-kind errors pass through unchanged.
    fn map_error(&self, err: ScimError) -> ScimError {
        match &err {
            ScimError::Internal(msg) if self.id.is_some() => {
                warn!("{} provider error for id={:?}: {msg}", self.resource_type, self.id);
                ScimError::not_found(&self.resource_type, format!("{} ({msg})", self.id.clone().unwrap_or_default()))
            }
            _ => err,
        }
    }
}

fn build_projection(attributes: Option<&str>, excluded: Option<&str>) -> ScimResult<Option<Filter>> {
    if attributes.is_none() && excluded.is_none() {
        return Ok(None);
    }
    let attrs: Vec<String> = attributes
        .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    let excl: Vec<String> = excluded
        .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    if attrs.is_empty() && excl.is_empty() {
        return Ok(None);
    }
    Ok(Some(Filter::projection(&attrs, &excl)))
}
