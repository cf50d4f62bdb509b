//! PostgreSQL backend over the blocking `postgres` client.
//!
//! Values travel as text and are cast server-side (`$n::text::<type>`), and
//! reads cast every column to text before parsing it with the catalog type.
//! That keeps the client free of per-type `ToSql` plumbing.

use postgres::types::ToSql;
use postgres::{Client, NoTls};
use tracing::{debug, info};

use bronze_model::{ColumnSpec, Frame, SqlType, TableRef, UpsertOutcome, Value, WarehouseError};

use crate::run::{RunRecord, RunStatus};
use crate::upsert::{UpsertBatch, placeholder, qualified, quote_ident, sql_text};
use crate::{Result, Warehouse};

const DESCRIBE_SQL: &str = "\
SELECT c.column_name::text,
       c.data_type::text,
       EXISTS (
           SELECT 1
             FROM information_schema.table_constraints tc
             JOIN information_schema.key_column_usage kcu
               ON tc.constraint_name = kcu.constraint_name
              AND tc.table_schema = kcu.table_schema
              AND tc.table_name = kcu.table_name
            WHERE tc.constraint_type = 'PRIMARY KEY'
              AND tc.table_schema = c.table_schema
              AND tc.table_name = c.table_name
              AND kcu.column_name = c.column_name
       ) AS is_primary_key
  FROM information_schema.columns c
 WHERE c.table_schema = $1
   AND c.table_name = $2
 ORDER BY c.ordinal_position";

pub struct PostgresWarehouse {
    client: Client,
    in_transaction: bool,
}

impl PostgresWarehouse {
    pub fn connect(url: &str) -> Result<Self> {
        let client = Client::connect(url, NoTls)
            .map_err(|source| WarehouseError::query("connecting to the warehouse", source))?;
        info!("connected to warehouse");
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            in_transaction: false,
        }
    }

    fn query_text(
        &mut self,
        context: &str,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<Vec<postgres::Row>> {
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|param| param as &(dyn ToSql + Sync))
            .collect();
        self.client
            .query(sql, &refs)
            .map_err(|source| WarehouseError::query(context, source))
    }

    fn column_types(&mut self, table: &TableRef) -> Result<Vec<ColumnSpec>> {
        let columns = self.describe_table(table)?;
        if columns.is_empty() {
            return Err(WarehouseError::TableNotFound {
                table: table.to_string(),
            });
        }
        Ok(columns)
    }
}

fn text_cell(row: &postgres::Row, index: usize, context: &str) -> Result<Option<String>> {
    row.try_get::<_, Option<String>>(index)
        .map_err(|source| WarehouseError::query(context.to_string(), source))
}

impl Warehouse for PostgresWarehouse {
    fn describe_table(&mut self, table: &TableRef) -> Result<Vec<ColumnSpec>> {
        let context = format!("describing {table}");
        let params = [Some(table.schema.clone()), Some(table.table.clone())];
        let rows = self.query_text(&context, DESCRIBE_SQL, &params)?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = text_cell(row, 0, &context)?.unwrap_or_default();
            let data_type = text_cell(row, 1, &context)?.unwrap_or_default();
            let is_primary_key = row
                .try_get::<_, bool>(2)
                .map_err(|source| WarehouseError::query(context.clone(), source))?;
            let mut column = ColumnSpec::new(name, SqlType::from_catalog(&data_type));
            column.is_primary_key = is_primary_key;
            columns.push(column);
        }
        Ok(columns)
    }

    fn fetch_rows(&mut self, table: &TableRef, columns: &[String]) -> Result<Option<Frame>> {
        let available = self.describe_table(table)?;
        if available.is_empty() {
            return Ok(None);
        }
        let selected: Vec<&ColumnSpec> = columns
            .iter()
            .filter_map(|name| available.iter().find(|column| &column.name == name))
            .collect();
        let mut frame = Frame::new(table.table.clone());
        for column in &selected {
            frame.ensure_column(&column.name);
        }
        if selected.is_empty() {
            return Ok(Some(frame));
        }
        let select_list: Vec<String> = selected
            .iter()
            .map(|column| format!("{}::text", quote_ident(&column.name)))
            .collect();
        let sql = format!("SELECT {} FROM {}", select_list.join(", "), qualified(table));
        let context = format!("reading {table}");
        let rows = self.query_text(&context, &sql, &[])?;
        for row in &rows {
            let mut cells = std::collections::BTreeMap::new();
            for (index, column) in selected.iter().enumerate() {
                let text = text_cell(row, index, &context)?;
                cells.insert(
                    column.name.clone(),
                    column.sql_type.value_from_text(text.as_deref()),
                );
            }
            frame.push_cells(cells);
        }
        debug!(table = %table, rows = frame.height(), "fetched reference rows");
        Ok(Some(frame))
    }

    fn execute_upsert(&mut self, batch: &UpsertBatch) -> Result<UpsertOutcome> {
        let context = format!("upserting into {}", batch.table);
        let rows = self.query_text(&context, &batch.sql(), &batch.parameters())?;
        let key_specs = batch.key_specs();
        let mut outcome = UpsertOutcome::default();
        for row in &rows {
            let mut key = Vec::with_capacity(key_specs.len());
            for (index, spec) in key_specs.iter().enumerate() {
                let text = text_cell(row, index, &context)?;
                key.push(spec.sql_type.value_from_text(text.as_deref()));
            }
            let inserted = row
                .try_get::<_, bool>(key_specs.len())
                .map_err(|source| WarehouseError::query(context.clone(), source))?;
            if inserted {
                outcome.inserted_keys.push(key);
            } else {
                outcome.updated_keys.push(key);
            }
        }
        Ok(outcome)
    }

    fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(WarehouseError::Transaction(
                "a transaction is already open".to_string(),
            ));
        }
        self.client
            .batch_execute("BEGIN")
            .map_err(|source| WarehouseError::query("beginning transaction", source))?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(WarehouseError::Transaction("no open transaction".to_string()));
        }
        self.in_transaction = false;
        self.client
            .batch_execute("COMMIT")
            .map_err(|source| WarehouseError::query("committing transaction", source))
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.client
            .batch_execute("ROLLBACK")
            .map_err(|source| WarehouseError::query("rolling back transaction", source))
    }

    fn register_run(&mut self, table: &TableRef, run: &RunRecord) -> Result<()> {
        let available = self.column_types(table)?;
        let started_at = Value::Timestamp(run.started_at.naive_utc());
        let candidates = [
            ("run_id", Value::text(run.run_id.as_str())),
            ("environment", Value::from(run.environment.clone())),
            ("source_url", Value::from(run.source_url.clone())),
            ("run_started_at", started_at),
        ];
        let mut names = Vec::new();
        let mut placeholders = Vec::new();
        let mut params = Vec::new();
        for (name, value) in candidates {
            let Some(spec) = available.iter().find(|column| column.name == name) else {
                continue;
            };
            params.push(sql_text(&value));
            names.push(quote_ident(name));
            placeholders.push(placeholder(params.len(), &spec.sql_type));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            qualified(table),
            names.join(", "),
            placeholders.join(", ")
        );
        self.query_text("registering ingestion run", &sql, &params)?;
        info!(run_id = %run.run_id, table = %table, "registered ingestion run");
        Ok(())
    }

    fn finalize_run(
        &mut self,
        table: &TableRef,
        run_id: &str,
        status: RunStatus,
        notes: Option<&str>,
    ) -> Result<()> {
        let available = self.column_types(table)?;
        let type_of = |name: &str| {
            available
                .iter()
                .find(|column| column.name == name)
                .map_or(SqlType::Text, |column| column.sql_type.clone())
        };
        let sql = format!(
            "UPDATE {} SET status = {}, run_finished_at = CURRENT_TIMESTAMP, notes = COALESCE({}, notes) WHERE run_id = {}",
            qualified(table),
            placeholder(1, &type_of("status")),
            placeholder(2, &type_of("notes")),
            placeholder(3, &type_of("run_id")),
        );
        let params = [
            Some(status.as_str().to_string()),
            notes.map(str::to_string),
            Some(run_id.to_string()),
        ];
        self.query_text("finalizing ingestion run", &sql, &params)?;
        info!(run_id, status = %status, "finalized ingestion run");
        Ok(())
    }
}
