use crate::sink::LogSink;
use crate::view::ComponentView;
use std::path::Path;
use std::process::ExitCode;
use tabled::{Table, settings::Style};
use tracing::info;
use webscope_core::BootstrapConfig;

pub fn run(
    webapp: &Path,
    config: BootstrapConfig,
    dump: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut deployment =
        webscope_runtime::build_deployment(webapp, config, Box::new(LogSink::new()))?;

    info!("Assembling {}...", webapp.display());
    let report = deployment.deploy()?;
    let descriptor = &report.descriptor;

    let rows: Vec<ComponentView> = descriptor.entries().map(ComponentView::from_entry).collect();
    println!("{}", Table::new(&rows).with(Style::psql()));

    if !descriptor.fragment_order().is_empty() {
        println!("fragment order: {}", descriptor.fragment_order().join(", "));
    }
    if !descriptor.context_params().is_empty() {
        for (name, value) in descriptor.context_params() {
            println!("context-param {name} = {value}");
        }
    }
    for binding in &report.bindings {
        println!(
            "initializer {} <- {} class(es)",
            binding.initializer,
            binding.matched_classes.len()
        );
    }
    for class in &report.unreadable_classes {
        println!("warning: could not read annotations of {class}");
    }

    if dump {
        println!("{}", descriptor.to_json_pretty()?);
    }

    if report.ok {
        println!(
            "ok: {} component(s) from {} scanned location(s)",
            descriptor.len(),
            report.scanned_locations
        );
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in &report.failures {
            eprintln!("failure: {failure}");
        }
        Ok(ExitCode::FAILURE)
    }
}
