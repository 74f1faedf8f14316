//! Types command implementation.

use crate::commands::open_registry;
use crate::Format;
use arbor_core::{NodeTypeRegistry, TypeDefinition};
use serde::Serialize;
use std::path::Path;

/// A type together with its resolved inheritance.
#[derive(Debug, Serialize)]
pub struct TypeReport {
    /// The stored definition.
    pub definition: TypeDefinition,
    /// Transitive supertypes, nearest first.
    pub supertypes: Vec<String>,
}

/// Runs the types command.
pub fn run(path: &Path, name: Option<&str>, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let registry = open_registry(path)?;
    match name {
        Some(name) => show(&registry, name, format),
        None => list(&registry, format),
    }
}

fn list(registry: &NodeTypeRegistry, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let types = registry.list_types()?;
    match format {
        Format::Json => {
            let names: Vec<String> = types.iter().map(|t| t.name.to_string()).collect();
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        Format::Text => {
            for ty in &types {
                let kind = if ty.is_mixin { "mixin" } else { "primary" };
                println!("{:<32} {kind}", ty.name);
            }
            println!();
            println!("{} node types", types.len());
        }
    }
    Ok(())
}

fn show(registry: &NodeTypeRegistry, name: &str, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let report = TypeReport {
        definition: registry.lookup(name)?,
        supertypes: registry
            .supertypes(name)?
            .iter()
            .map(ToString::to_string)
            .collect(),
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print_text_output(&report),
    }
    Ok(())
}

fn print_text_output(report: &TypeReport) {
    let def = &report.definition;
    println!("[{}]", def.name);
    if !report.supertypes.is_empty() {
        println!("  Supertypes:  {}", report.supertypes.join(", "));
    }
    let mut flags = Vec::new();
    if def.is_mixin {
        flags.push("mixin");
    }
    if def.is_abstract {
        flags.push("abstract");
    }
    if def.orderable {
        flags.push("orderable");
    }
    if !flags.is_empty() {
        println!("  Options:     {}", flags.join(" "));
    }
    if let Some(item) = &def.primary_item {
        println!("  Primary:     {item}");
    }

    for prop in &def.properties {
        let mut line = format!("  - {} ({})", prop.name, prop.required_type);
        if prop.mandatory {
            line.push_str(" mandatory");
        }
        if prop.autocreated {
            line.push_str(" autocreated");
        }
        if prop.protected {
            line.push_str(" protected");
        }
        if prop.multiplicity.is_multiple() {
            line.push_str(" multiple");
        }
        if !prop.default_values.is_empty() {
            line.push_str(&format!(" = {}", prop.default_values.join(", ")));
        }
        println!("{line}");
    }

    for child in &def.children {
        let required: Vec<String> = child
            .required_primary_types
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut line = format!("  + {} ({})", child.name, required.join(", "));
        if let Some(default) = &child.default_primary_type {
            line.push_str(&format!(" = {default}"));
        }
        if child.mandatory {
            line.push_str(" mandatory");
        }
        if child.same_name_siblings {
            line.push_str(" sns");
        }
        println!("{line}");
    }
}
