//! Gateway-backed CRUD commands for the four shop resources.

use clap::{Args, ValueEnum};
use serde_json::Value;
use std::io::{self, Write};

use tailorshop_core::{EntityKind, Fetched, ReadData, Record, Source, Written};

use super::OutputFormat;
use crate::context::AppContext;

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum Resource {
    Customers,
    Orders,
    Employees,
    SuitTypes,
}

impl From<Resource> for EntityKind {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Customers => EntityKind::Customers,
            Resource::Orders => EntityKind::Orders,
            Resource::Employees => EntityKind::Employees,
            Resource::SuitTypes => EntityKind::SuitTypes,
        }
    }
}

/// Fetch a collection or a single record
#[derive(Args)]
pub struct GetCommand {
    #[arg(value_enum)]
    resource: Resource,

    /// Record ID; omit to list the collection
    id: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Create a record
#[derive(Args)]
pub struct CreateCommand {
    #[arg(value_enum)]
    resource: Resource,

    /// Record body as a JSON object
    #[arg(long, short)]
    data: String,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Update a record
#[derive(Args)]
pub struct UpdateCommand {
    #[arg(value_enum)]
    resource: Resource,

    /// Record ID
    id: String,

    /// Fields to write, as a JSON object
    #[arg(long, short)]
    data: String,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Delete a record
#[derive(Args)]
pub struct DeleteCommand {
    #[arg(value_enum)]
    resource: Resource,

    /// Record ID
    id: String,

    /// Skip confirmation prompt
    #[arg(long)]
    force: bool,
}

impl GetCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        let kind = EntityKind::from(self.resource);
        let url = match &self.id {
            Some(id) => ctx.endpoints.item(kind, id),
            None => ctx.endpoints.collection(kind),
        };

        let fetched = ctx.gateway().read(&url).await?;
        print_fetched(&fetched, self.format)
    }
}

impl CreateCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        let kind = EntityKind::from(self.resource);
        let payload = parse_record(&self.data)?;

        let written = ctx
            .gateway()
            .create(&ctx.endpoints.collection(kind), payload)
            .await?;
        print_written(&written, self.format)
    }
}

impl UpdateCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        let kind = EntityKind::from(self.resource);
        let mut payload = parse_record(&self.data)?;
        payload.set_id(self.id.as_str());

        let written = ctx
            .gateway()
            .update(&ctx.endpoints.item(kind, &self.id), payload)
            .await?;
        print_written(&written, self.format)
    }
}

impl DeleteCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        let kind = EntityKind::from(self.resource);

        // Confirm deletion unless --force is used
        if !self.force {
            print!("Delete {} '{}'? [y/N] ", kind, self.id);
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        let removed = ctx
            .gateway()
            .remove(&ctx.endpoints.item(kind, &self.id))
            .await?;
        match removed.source {
            Source::Queued => println!("Deleted {} '{}' locally; queued for sync.", kind, self.id),
            _ => println!("Deleted {} '{}'.", kind, self.id),
        }
        Ok(())
    }
}

fn parse_record(data: &str) -> Result<Record, Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(data)?;
    Record::from_value(value).ok_or_else(|| "--data must be a JSON object".into())
}

fn source_label(source: Source) -> &'static str {
    match source {
        Source::Server => "server",
        Source::Cache => "local cache",
        Source::Queued => "queued for sync",
    }
}

fn print_fetched(fetched: &Fetched, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(fetched)?),
        OutputFormat::Text => {
            match &fetched.data {
                ReadData::Many(records) if records.is_empty() => println!("No records found."),
                ReadData::Many(records) => {
                    for record in records {
                        print_record_line(record)?;
                    }
                    println!();
                    println!("{} record(s)", records.len());
                }
                ReadData::One(Some(record)) => {
                    println!("{}", serde_json::to_string_pretty(record)?)
                }
                ReadData::One(None) => println!("Not found."),
            }
            println!("Source: {}", source_label(fetched.source));
        }
    }
    Ok(())
}

fn print_written(written: &Written, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(written)?),
        OutputFormat::Text => {
            println!("{}", serde_json::to_string_pretty(&written.record)?);
            println!("Source: {}", source_label(written.source));
        }
    }
    Ok(())
}

fn print_record_line(record: &Record) -> Result<(), Box<dyn std::error::Error>> {
    let marker = if record.is_offline() { " *" } else { "" };
    let body = serde_json::to_string(&record.without_local_fields())?;
    println!("{}{}  {}", record.id().unwrap_or("-"), marker, body);
    Ok(())
}
