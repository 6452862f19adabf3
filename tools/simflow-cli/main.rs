use clap::{Parser, Subcommand, ValueEnum};
use simflow::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Define a CLI-specific enum for clap to parse.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormCli {
    Class,
    Execution,
}

impl From<FormCli> for CodeForm {
    fn from(value: FormCli) -> Self {
        match value {
            FormCli::Class => CodeForm::Class,
            FormCli::Execution => CodeForm::Execution,
        }
    }
}

/// Checks simulation workflows and generates their program code
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report the consistency issues of a workflow
    Check {
        /// Path to the workflow JSON file
        workflow: PathBuf,
        /// Model definition files to load first
        #[arg(short, long)]
        models: Vec<PathBuf>,
        /// Check for the standalone execution form
        #[arg(short, long)]
        execution: bool,
    },
    /// Generate program code for a workflow
    Generate {
        /// Path to the workflow JSON file
        workflow: PathBuf,
        /// Model definition files to load first
        #[arg(short, long)]
        models: Vec<PathBuf>,
        /// The form of the generated program
        #[arg(short, long, value_enum, default_value = "class")]
        form: FormCli,
        /// JSON file with generator options
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write the program here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the model classes found in model definition files
    Models {
        files: Vec<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("simflow=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check {
            workflow,
            models,
            execution,
        } => run_check(workflow, &models, execution),
        Command::Generate {
            workflow,
            models,
            form,
            config,
            output,
        } => run_generate(workflow, &models, form.into(), config, output),
        Command::Models { files } => run_models(&files),
    }
}

fn load_registry(files: &[PathBuf]) -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    for file in files {
        load_models_from_file(file, &mut registry)
            .unwrap_or_else(|e| exit_with_error(&e.to_string()));
    }
    registry
}

fn load_workflow(path: PathBuf, models: &[PathBuf]) -> Workflow {
    let registry = load_registry(models);
    Workflow::load(&path, registry).unwrap_or_else(|e| exit_with_error(&e.to_string()))
}

fn run_check(path: PathBuf, models: &[PathBuf], for_execution: bool) {
    let workflow = load_workflow(path, models);
    let issues = workflow.consistency_issues(for_execution);
    if issues.is_empty() {
        println!("Workflow '{}' is consistent.", workflow.name());
        return;
    }
    println!("Workflow '{}' has {} issue(s):", workflow.name(), issues.len());
    for issue in &issues {
        println!("  -> {}", issue);
    }
    std::process::exit(2);
}

fn run_generate(
    path: PathBuf,
    models: &[PathBuf],
    form: CodeForm,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
) {
    let start = Instant::now();
    let mut workflow = load_workflow(path, models);

    let options = match config {
        Some(config) => {
            let json = fs::read_to_string(&config).unwrap_or_else(|e| {
                exit_with_error(&format!(
                    "Failed to read config file '{}': {}",
                    config.display(),
                    e
                ))
            });
            serde_json::from_str::<GeneratorOptions>(&json)
                .unwrap_or_else(|e| exit_with_error(&format!("Invalid generator config: {}", e)))
        }
        None => GeneratorOptions {
            class_name: workflow.class_name(),
            ..GeneratorOptions::default()
        },
    };

    let issues = workflow.consistency_issues(form == CodeForm::Execution);
    for issue in &issues {
        tracing::warn!("{}", issue);
    }

    let generator = CodeGenerator::builder(&options.class_name)
        .with_options(options)
        .build();
    let source = generator
        .generate_source(&mut workflow, form)
        .unwrap_or_else(|e| exit_with_error(&format!("Code generation failed: {}", e)));

    match output {
        Some(output) => {
            fs::write(&output, format!("{}\n", source)).unwrap_or_else(|e| {
                exit_with_error(&format!(
                    "Could not write to file '{}': {}",
                    output.display(),
                    e
                ))
            });
            println!("Wrote {} in {:?}", output.display(), start.elapsed());
        }
        None => println!("{}", source),
    }
}

fn run_models(files: &[PathBuf]) {
    let registry = load_registry(files);
    println!("Found {} model class(es):", registry.len());
    for class in registry.classes() {
        println!(
            "  -> {} ({}): {} inputs, {} outputs",
            class.class_name,
            class.metadata.name,
            class.metadata.inputs.len(),
            class.metadata.outputs.len()
        );
        println!("     {}", class.import_statement);
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
