use std::collections::BTreeMap;
use std::time::Instant;

use relforge_core::{
    EntityCatalog, EntityDefinition, LIKE_PARAMETER, MODE_PARAMETER, ProcedureDefinition,
    ProcedureKind, Value, ViewDefinition,
};
use relforge_generate::GenerateOptions;
use serde::Serialize;
use tracing::{debug, warn};

use crate::call::{Arguments, prepare_call};
use crate::errors::{Result, RuntimeError};
use crate::executor::{ClaimsSource, ResultSet, SqlExecutor};
use crate::schema::ResultSchema;
use crate::status::ProcedureOutcome;

/// One result row keyed by column name.
pub type Record = BTreeMap<String, Value>;

/// Paging direction of a browsing view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    fn mode(self) -> &'static str {
        match self {
            Direction::Forward => "F",
            Direction::Backward => "B",
        }
    }
}

/// Parameters of one page of a browsing view.
#[derive(Debug, Clone, Default)]
pub struct BrowseRequest {
    /// Equality filters keyed by column name.
    pub filters: Arguments,
    /// Browsing-key value to page from; `None` starts at the first row.
    pub from: Option<Value>,
    pub direction: Direction,
    /// Search phrases; every phrase must appear in some searchable column.
    pub phrases: Vec<String>,
}

impl BrowseRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn from(mut self, key: impl Into<Value>, direction: Direction) -> Self {
        self.from = Some(key.into());
        self.direction = direction;
        self
    }

    pub fn phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrases.push(phrase.into());
        self
    }
}

/// Calls the generated procedures of a catalog through an executor.
pub struct EntityClient<E, C> {
    catalog: EntityCatalog,
    schema: String,
    executor: E,
    claims: C,
}

impl<E, C> EntityClient<E, C>
where
    E: SqlExecutor,
    C: ClaimsSource,
{
    pub fn new(catalog: EntityCatalog, options: &GenerateOptions, executor: E, claims: C) -> Self {
        Self {
            catalog,
            schema: options.schema.clone(),
            executor,
            claims,
        }
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// `{mneo}_get`: the row for `key`, if any.
    pub async fn get(&self, mneo: &str, key: &Arguments) -> Result<Option<Record>> {
        let entity = self.entity(mneo)?;
        let procedure = standard(entity, ProcedureKind::Get)?;
        let result = self.run(procedure, key).await?;
        ResultSchema::get(entity, procedure.name()).check(&result)?;
        Ok(result.records().into_iter().next())
    }

    /// `{mneo}_update`: insert or update; pass the `dt_lu` read by `get` to
    /// update, NULL to insert.
    pub async fn update(&self, mneo: &str, values: &Arguments) -> Result<ProcedureOutcome> {
        let entity = self.entity(mneo)?;
        let procedure = standard(entity, ProcedureKind::Update)?;
        self.run_status(entity, procedure, values).await
    }

    /// `{mneo}_drop`.
    pub async fn drop(&self, mneo: &str, key: &Arguments) -> Result<ProcedureOutcome> {
        let entity = self.entity(mneo)?;
        let procedure = standard(entity, ProcedureKind::Drop)?;
        self.run_status(entity, procedure, key).await
    }

    /// `{mneo}_lookup`: the description of the row for `key`.
    pub async fn lookup(&self, mneo: &str, key: &Arguments) -> Result<Option<Value>> {
        let entity = self.entity(mneo)?;
        let procedure = standard(entity, ProcedureKind::Lookup)?;
        let schema = ResultSchema::lookup(entity, procedure.name())?;
        let result = self.run(procedure, key).await?;
        schema.check(&result)?;
        Ok(result
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next()))
    }

    /// One page of `{mneo}_brw{suffix}`.
    pub async fn browse(
        &self,
        mneo: &str,
        suffix: &str,
        request: &BrowseRequest,
    ) -> Result<Vec<Record>> {
        let entity = self.entity(mneo)?;
        let view = entity
            .views()
            .iter()
            .find(|view| view.suffix() == suffix)
            .ok_or_else(|| RuntimeError::UnknownProcedure {
                entity: mneo.to_string(),
                name: format!("{mneo}_brw{suffix}"),
            })?;

        let args = browse_arguments(view, request);
        let result = self.run(view.procedure(), &args).await?;
        ResultSchema::view(entity, view).check(&result)?;
        Ok(result.records())
    }

    /// Any procedure of the entity by name; the result is returned unchecked.
    pub async fn call(&self, mneo: &str, name: &str, args: &Arguments) -> Result<ResultSet> {
        let entity = self.entity(mneo)?;
        let procedure = entity
            .procedure(name)
            .ok_or_else(|| RuntimeError::UnknownProcedure {
                entity: mneo.to_string(),
                name: name.to_string(),
            })?;
        self.run(procedure, args).await
    }

    fn entity(&self, mneo: &str) -> Result<&EntityDefinition> {
        self.catalog
            .get(mneo)
            .filter(|entity| !entity.is_fake())
            .ok_or_else(|| RuntimeError::UnknownEntity(mneo.to_string()))
    }

    async fn run(&self, procedure: &ProcedureDefinition, args: &Arguments) -> Result<ResultSet> {
        let call = prepare_call(
            &self.schema,
            procedure,
            args,
            &self.claims,
            self.executor.in_transaction(),
        )?;
        let started = Instant::now();
        let result = self.executor.execute(&call).await?;
        debug!(
            event = "procedure_executed",
            procedure = %call.procedure,
            rows = result.rows.len(),
            duration_ms = started.elapsed().as_millis() as u64,
        );
        Ok(result)
    }

    async fn run_status(
        &self,
        entity: &EntityDefinition,
        procedure: &ProcedureDefinition,
        args: &Arguments,
    ) -> Result<ProcedureOutcome> {
        let result = self.run(procedure, args).await?;
        ResultSchema::status(procedure.name()).check(&result)?;
        let Some(row) = result.rows.first() else {
            return Err(RuntimeError::ResultShape {
                procedure: procedure.name().to_string(),
                reason: "no status row".to_string(),
            });
        };
        let status = match &row[0] {
            Value::Int32(code) => *code,
            other => {
                return Err(RuntimeError::ResultShape {
                    procedure: procedure.name().to_string(),
                    reason: format!("status is not an int: {other:?}"),
                });
            }
        };
        let outcome = ProcedureOutcome::from_status(status, row[1].as_str());
        match &outcome {
            ProcedureOutcome::RecordHasChanged => warn!(
                event = "record_has_changed",
                mneo = entity.mneo(),
                procedure = procedure.name(),
            ),
            ProcedureOutcome::Failed { status, message } => warn!(
                event = "procedure_failed",
                mneo = entity.mneo(),
                procedure = procedure.name(),
                status,
                message = %message,
            ),
            _ => {}
        }
        Ok(outcome)
    }
}

fn standard(entity: &EntityDefinition, kind: ProcedureKind) -> Result<&ProcedureDefinition> {
    entity
        .standard_procedure(kind)
        .ok_or_else(|| RuntimeError::UnknownProcedure {
            entity: entity.mneo().to_string(),
            name: entity.object_name(kind),
        })
}

fn browse_arguments(view: &ViewDefinition, request: &BrowseRequest) -> Arguments {
    let mut args = request.filters.clone();
    if let Some(from) = &request.from {
        args.insert(
            view.browsing_key().column().name().to_string(),
            from.clone(),
        );
        if let Some(mode) = system_column(view, MODE_PARAMETER) {
            args.insert(mode, Value::from(request.direction.mode()));
        }
    }
    if !request.phrases.is_empty() {
        if let Some(like) = system_column(view, LIKE_PARAMETER) {
            args.insert(like, Value::TextArray(request.phrases.clone()));
        }
    }
    args
}

fn system_column(view: &ViewDefinition, parameter: &str) -> Option<String> {
    view.parms()
        .iter()
        .map(|parm| parm.column())
        .find(|column| column.parameter_name() == parameter)
        .map(|column| column.name().to_string())
}
