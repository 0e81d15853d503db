//! Console output for command results

use colored::Colorize;
use tactica_application::{DispatchReport, LoadPackagesOutput, SpawnMobOutput};
use tactica_domain::{ApiSurface, ScriptDiagnostic};

/// Formats command results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    pub fn packages(output: &LoadPackagesOutput) -> String {
        let mut out = String::new();
        out.push_str(&Self::section_header("Packages"));

        for package in &output.loaded {
            let id = package
                .id
                .as_ref()
                .map(|id| id.as_str().to_string())
                .unwrap_or_else(|| "<no id>".to_string());
            out.push_str(&format!(
                "  {} {} {}\n",
                "ok".green().bold(),
                id.bold(),
                format!("({}, {})", package.kind, package.path.display()).dimmed()
            ));
        }
        for failure in &output.failures {
            out.push_str(&format!(
                "  {} {} {}\n",
                "failed".red().bold(),
                failure.path.display(),
                failure.error
            ));
        }

        let order = output.dependencies.load_order();
        if !order.is_empty() {
            out.push_str(&Self::section_header("Dependencies"));
            for package in order {
                let deps = output
                    .dependencies
                    .dependencies_of(&package)
                    .unwrap_or(&[]);
                if deps.is_empty() {
                    out.push_str(&format!("  {}\n", package));
                } else {
                    out.push_str(&format!("  {} -> {}\n", package, deps.join(", ")));
                }
            }
        }

        out.push_str(&format!(
            "\n{} loaded, {} failed\n",
            output.loaded.len().to_string().green(),
            output.failures.len().to_string().red()
        ));
        out
    }

    pub fn spawn(output: &SpawnMobOutput, report: &DispatchReport, frames: u32) -> String {
        let mut out = String::new();
        out.push_str(&Self::section_header("Mob"));
        if let Some(background) = &output.background {
            out.push_str(&format!("  {} {}\n", "Background:".cyan(), background));
        }
        if let Some(music) = &output.music {
            out.push_str(&format!("  {} {}\n", "Music:".cyan(), music));
        }
        for spawned in &output.spawned {
            out.push_str(&format!(
                "  #{} {} {:?} at ({}, {})\n",
                spawned.id,
                spawned.fqn.bold(),
                spawned.rank,
                spawned.tile.0,
                spawned.tile.1
            ));
        }

        out.push_str(&Self::section_header(&format!("{} frames", frames)));
        out.push_str(&format!(
            "  {} callbacks fired, {} skipped, {} failed\n",
            report.fired,
            report.skipped,
            report.failures.len()
        ));
        out
    }

    pub fn api(surface: &ApiSurface) -> String {
        let mut out = String::new();

        out.push_str(&Self::section_header("Types"));
        for ty in &surface.types {
            out.push_str(&format!("  {}\n", ty.qualified_name().yellow().bold()));
            for constructor in &ty.constructors {
                out.push_str(&format!("    {}.{}()\n", ty.qualified_name(), constructor));
            }
            for property in &ty.properties {
                let access = if property.writable { "rw" } else { "r" };
                out.push_str(&format!("    .{} [{}]\n", property.name, access));
            }
            for method in &ty.methods {
                out.push_str(&format!("    :{}()\n", method));
            }
        }

        out.push_str(&Self::section_header("Functions"));
        for function in &surface.functions {
            out.push_str(&format!("  {}()\n", function.qualified_name()));
        }

        out.push_str(&Self::section_header("Enums"));
        for descriptor in &surface.enums {
            let entries = descriptor
                .entries
                .iter()
                .map(|(label, value)| format!("{}={}", label, value))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("  {} {{ {} }}\n", descriptor.path.bold(), entries));
        }
        out
    }

    pub fn diagnostics(diagnostics: &[ScriptDiagnostic]) -> String {
        if diagnostics.is_empty() {
            return String::new();
        }
        let mut out = Self::section_header("Script diagnostics");
        for diagnostic in diagnostics {
            out.push_str(&format!("  {}\n", diagnostic.to_string().red()));
        }
        out
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n", format!("== {} ==", title).cyan().bold())
    }
}
