//! # simflow - Simulation Workflow Graphs and Code Generation
//!
//! **simflow** models a multi-physics simulation workflow as a tree of execution blocks
//! whose typed data slots are wired together by data links, and lowers that tree to a
//! runnable MuPIF-style Python program.
//!
//! ## Core Workflow
//!
//! 1.  **Discover Models**: Load model definition files into a
//!     [`ModelRegistry`](model::ModelRegistry).
//! 2.  **Build the Graph**: Add blocks to a [`Workflow`](workflow::Workflow) and connect their
//!     slots. Every rejected connection leaves the graph untouched.
//! 3.  **Check**: `check_consistency` reports whether every required slot is connected.
//! 4.  **Generate**: Use `CodeGenerator::builder` to emit either a reusable workflow class or a
//!     standalone execution script. Alternatively, run the graph in-process with the
//!     [`runtime`] backend against native `Model` implementations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use simflow::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut registry = ModelRegistry::new();
//!     load_models_from_file("models.json", &mut registry)?;
//!
//!     let mut workflow = Workflow::with_registry("Cantilever", registry);
//!     let root = workflow.root();
//!
//!     let start = workflow.add_block(
//!         root,
//!         BlockKind::Variable(VariableKind::ConstantPhysicalQuantity {
//!             value: 0.0,
//!             units: "s".into(),
//!         }),
//!     )?;
//!     let target = workflow.add_block(
//!         root,
//!         BlockKind::Variable(VariableKind::ConstantPhysicalQuantity {
//!             value: 10.0,
//!             units: "s".into(),
//!         }),
//!     )?;
//!     let time_loop = workflow.add_block(root, BlockKind::TimeLoop)?;
//!     workflow.add_model_block(time_loop, "thermal_nonstat")?;
//!
//!     let value = |w: &Workflow, b| w.slot_by_name(b, "value").unwrap();
//!     let start_slot = workflow.slot_by_name(time_loop, "start_time").unwrap();
//!     let target_slot = workflow.slot_by_name(time_loop, "target_time").unwrap();
//!     workflow.connect(value(&workflow, start), start_slot)?;
//!     workflow.connect(value(&workflow, target), target_slot)?;
//!
//!     if workflow.check_consistency(true) {
//!         let generator = CodeGenerator::builder("Cantilever").build();
//!         println!("{}", generator.generate_source(&mut workflow, CodeForm::Execution)?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod block;
pub mod codegen;
pub mod error;
pub mod link;
pub mod model;
pub mod prelude;
pub mod runtime;
pub mod serialization;
pub mod slot;
pub mod workflow;
