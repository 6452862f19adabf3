//! Tests for identifier assignment and program generation.
mod common;
use common::*;
use simflow::prelude::*;

fn has_line(lines: &[String], expected: &str) -> bool {
    lines.iter().any(|line| line == expected)
}

fn position(lines: &[String], expected: &str) -> usize {
    lines
        .iter()
        .position(|line| line == expected)
        .unwrap_or_else(|| panic!("missing line {:?} in\n{}", expected, lines.join("\n")))
}

/// A thermal model wired to one workflow input and one workflow output.
fn create_class_workflow() -> Workflow {
    let mut workflow = Workflow::with_registry("MyWorkflow", create_registry());
    let root = workflow.root();
    let thermal = workflow.add_model_block(root, THERMAL).unwrap();
    let input = workflow
        .add_slot(root, SlotSpec::external_output("top_temperature", DataSlotType::Unknown))
        .unwrap();
    let output = workflow
        .add_slot(root, SlotSpec::external_input("temperature", DataSlotType::Unknown))
        .unwrap();
    workflow
        .connect(input, slot(&workflow, thermal, "top_temperature"))
        .unwrap();
    workflow
        .connect(slot(&workflow, thermal, "temperature"), output)
        .unwrap();
    workflow
}

#[test]
fn test_identifiers_are_unique_per_prefix() {
    let mut workflow = Workflow::new("Test");
    let root = workflow.root();
    let blocks: Vec<_> = (0..3)
        .map(|_| workflow.add_block(root, BlockKind::Sequential).unwrap())
        .collect();
    workflow.assign_code_names();

    let names: Vec<_> = blocks
        .iter()
        .map(|b| workflow.block(*b).unwrap().code_name().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["sequential_1", "sequential_2", "sequential_3"]);
}

#[test]
fn test_identifiers_survive_removal_without_collisions() {
    let mut workflow = Workflow::new("Test");
    let root = workflow.root();
    let first = workflow.add_block(root, BlockKind::Sequential).unwrap();
    let second = workflow.add_block(root, BlockKind::Sequential).unwrap();
    let third = workflow.add_block(root, BlockKind::Sequential).unwrap();
    workflow.assign_code_names();

    workflow.remove_block(second).unwrap();
    let fourth = workflow.add_block(root, BlockKind::Sequential).unwrap();
    workflow.assign_code_names();

    let name = |id| workflow.block(id).unwrap().code_name().unwrap().to_string();
    assert_eq!(name(first), "sequential_1");
    assert_eq!(name(third), "sequential_3");
    assert_eq!(name(fourth), "sequential_2");
}

#[test]
fn test_custom_name_takes_priority_when_free() {
    let mut workflow = Workflow::new("Test");
    let root = workflow.root();
    let kind = BlockKind::Variable(VariableKind::CustomName {
        name: "heat flux".to_string(),
        slot_type: DataSlotType::Field,
    });
    let first = workflow.add_block(root, kind.clone()).unwrap();
    let second = workflow.add_block(root, kind).unwrap();
    workflow.assign_code_names();

    assert_eq!(workflow.block(first).unwrap().code_name(), Some("heat_flux"));
    assert_eq!(workflow.block(second).unwrap().code_name(), Some("variable_1"));
}

#[test]
fn test_custom_name_never_shadows_members_or_keywords() {
    let mut workflow = Workflow::new("Test");
    let root = workflow.root();
    let named = |name: &str| {
        BlockKind::Variable(VariableKind::CustomName {
            name: name.to_string(),
            slot_type: DataSlotType::Double,
        })
    };
    let terminate = workflow.add_block(root, named("terminate")).unwrap();
    let keyword = workflow.add_block(root, named("class")).unwrap();
    let value = workflow
        .add_block(root, BlockKind::Variable(VariableKind::Float { value: 2.0 }))
        .unwrap();
    let source = slot(&workflow, value, "value");
    let target = slot(&workflow, terminate, "value");
    workflow.connect(source, target).unwrap();

    let lines = workflow.generate_workflow_code(CodeForm::Class).unwrap();

    assert_eq!(workflow.block(terminate).unwrap().code_name(), Some("variable_1"));
    assert_eq!(workflow.block(keyword).unwrap().code_name(), Some("variable_2"));
    assert!(has_line(&lines, "\t\tself.variable_1 = self.float_variable_1"));
    assert!(!lines.iter().any(|l| l.contains("self.terminate =")));
}

#[test]
fn test_class_is_named_after_the_sanitized_workflow_name() {
    let mut workflow = Workflow::with_registry("My workflow", create_registry());
    let lines = workflow.generate_workflow_code(CodeForm::Execution).unwrap();

    assert!(has_line(&lines, "class My_workflow(mupif.Workflow.Workflow):"));
    assert!(has_line(&lines, "\tproblem = My_workflow()"));
}

#[test]
fn test_invalid_class_name_is_rejected() {
    let mut workflow = Workflow::new("Test");
    for name in ["bad name", "2fast", "class", ""] {
        let generator = CodeGenerator::builder(name).build();
        assert!(matches!(
            generator.generate(&mut workflow, CodeForm::Class),
            Err(CodegenError::InvalidClassName(_))
        ));
    }
}

#[test]
fn test_unconnected_constant_emits_nothing() {
    let mut fixture = create_time_loop_workflow(create_registry());
    let root = fixture.workflow.root();
    let unused = property_block(&mut fixture.workflow, root);

    let lines = fixture
        .workflow
        .generate_workflow_code(CodeForm::Execution)
        .unwrap();

    let unused_name = fixture.workflow.block(unused).unwrap().code_name().unwrap();
    assert_eq!(unused_name, "constant_property_2");
    assert!(!lines.iter().any(|l| l.contains("constant_property_2")));
}

#[test]
fn test_connected_constant_is_initialized_once_before_use() {
    let mut fixture = create_time_loop_workflow(create_registry());
    let lines = fixture
        .workflow
        .generate_workflow_code(CodeForm::Execution)
        .unwrap();

    let init = "\t\tself.constant_property_1 = mupif.Property.ConstantProperty((0.0,), \
                mupif.PropertyID.PID_Temperature, mupif.ValueType.Scalar, 'degC', None, 0)";
    assert_eq!(lines.iter().filter(|l| *l == init).count(), 1);
    let use_site = position(&lines, "\t\t\tself.model_1.set(self.constant_property_1, 3)");
    assert!(position(&lines, init) < use_site);
}

#[test]
fn test_time_loop_lowering() {
    let mut fixture = create_time_loop_workflow(create_registry());
    let lines = fixture
        .workflow
        .generate_workflow_code(CodeForm::Execution)
        .unwrap();

    let expected = [
        "\t\t# execution code of timeloop_1 (TimeLoopBlock)",
        "\t\ttimeloop_1_time_units = 's'",
        "\t\ttimeloop_1_time = self.constant_physical_quantity_1",
        "\t\ttimeloop_1_target_time = self.constant_physical_quantity_2",
        "\t\ttimeloop_1_compute = True",
        "\t\ttimeloop_1_time_step_number = 0",
        "\t\twhile timeloop_1_compute:",
        "\t\t\ttimeloop_1_time_step_number += 1",
        "",
        "\t\t\ttimeloop_1_dt = min([self.model_1.getCriticalTimeStep()])",
        "\t\t\ttimeloop_1_time = min(timeloop_1_time+timeloop_1_dt, timeloop_1_target_time)",
        "",
        "\t\t\tif timeloop_1_time.inUnitsOf(timeloop_1_time_units).getValue() + 1e-6 > \
         timeloop_1_target_time.inUnitsOf(timeloop_1_time_units).getValue():",
        "\t\t\t\ttimeloop_1_compute = False",
        "",
        "\t\t\ttimeloop_1_time_step = mupif.TimeStep.TimeStep(timeloop_1_time, timeloop_1_dt, \
         timeloop_1_target_time, n=timeloop_1_time_step_number)",
        "",
        "\t\t\t# execution code of model_1 (thermal_nonstat)",
        "\t\t\tself.model_1.set(self.constant_property_1, 3)",
        "\t\t\tself.model_1.solveStep(timeloop_1_time_step)",
    ];
    let start = position(&lines, expected[0]);
    assert_eq!(&lines[start..start + expected.len()], &expected[..]);
}

#[test]
fn test_max_dt_joins_the_step_minimum() {
    let mut fixture = create_time_loop_workflow(create_registry());
    let root = fixture.workflow.root();
    let cap = quantity_block(&mut fixture.workflow, root, 0.5);
    let cap_value = slot(&fixture.workflow, cap, "value");
    let max_dt = slot(&fixture.workflow, fixture.time_loop, "max_dt");
    fixture.workflow.connect(cap_value, max_dt).unwrap();

    let lines = fixture
        .workflow
        .generate_workflow_code(CodeForm::Execution)
        .unwrap();
    assert!(has_line(
        &lines,
        "\t\t\ttimeloop_1_dt = min([self.constant_physical_quantity_3, self.model_1.getCriticalTimeStep()])"
    ));
}

#[test]
fn test_model_reads_upstream_model_output_with_loop_time() {
    let mut fixture = create_time_loop_workflow(create_registry());
    let mechanical = fixture
        .workflow
        .add_model_block(fixture.time_loop, MECHANICAL)
        .unwrap();
    let output = slot(&fixture.workflow, fixture.thermal, "temperature");
    let input = slot(&fixture.workflow, mechanical, "temperature");
    fixture.workflow.connect(output, input).unwrap();

    let lines = fixture
        .workflow
        .generate_workflow_code(CodeForm::Execution)
        .unwrap();
    assert!(has_line(
        &lines,
        "\t\t\tself.model_2.set(self.model_1.get(mupif.FieldID.FID_Temperature, \
         timeloop_1_time_step.getTime(), 0), 0)"
    ));
    assert!(has_line(
        &lines,
        "\t\t\ttimeloop_1_dt = min([self.model_1.getCriticalTimeStep(), self.model_2.getCriticalTimeStep()])"
    ));
}

#[test]
fn test_execution_form_ends_with_run_epilogue() {
    let mut fixture = create_time_loop_workflow(create_registry());
    let lines = fixture
        .workflow
        .generate_workflow_code(CodeForm::Execution)
        .unwrap();

    assert_eq!(&lines[..2], &["import mupif", "from models import thermal_nonstat"]);
    assert!(has_line(&lines, "\tdef solve(self, runInBackground=False):"));
    assert!(has_line(&lines, "\t\tself.terminate()"));
    assert!(has_line(&lines, "\t\tself.model_1.terminate()"));
    assert!(!has_line(&lines, "\tdef set(self, obj, objectID=0):"));
    assert_eq!(
        &lines[lines.len() - 6..],
        &[
            "if __name__ == '__main__':",
            "\tproblem = MyWorkflow()",
            "\tproblem.solve()",
            "\tproblem.terminate()",
            "",
            "\tprint('Simulation has finished.')",
        ]
    );
}

#[test]
fn test_class_form_bridges_external_slots() {
    let mut workflow = create_class_workflow();
    let lines = workflow.generate_workflow_code(CodeForm::Class).unwrap();

    let expected = [
        "class MyWorkflow(mupif.Workflow.Workflow):",
        "\tdef __init__(self):",
        "\t\tmupif.Workflow.Workflow.__init__(self)",
        "\t\tself.metadata.update({'name': 'MyWorkflow'})",
        "\t\tself.metadata.update({'inputs': [{'name': 'top_temperature', 'type': 'Property', \
         'optional': False, 'description': '', 'obj_type': 'mupif.PropertyID.PID_Temperature', \
         'obj_id': 'top_temperature'}]})",
        "\t\tself.metadata.update({'outputs': [{'name': 'temperature', 'type': 'Field', \
         'optional': True, 'description': '', 'obj_type': 'mupif.FieldID.FID_Temperature', \
         'obj_id': 'temperature'}]})",
        "",
        "\t\t# initialization code of external input",
        "\t\tself.external_input_1 = None",
        "\t\t# It should be defined from outside using set() method.",
        "",
        "\t\t# initialization code of model_1 (thermal_nonstat)",
        "\t\tself.model_1 = thermal_nonstat()",
    ];
    let start = position(&lines, expected[0]);
    assert_eq!(&lines[start..start + expected.len()], &expected[..]);

    assert!(has_line(&lines, "\t\treturn min([self.model_1.getCriticalTimeStep()])"));
    let set_start = position(&lines, "\tdef set(self, obj, objectID=0):");
    assert_eq!(
        &lines[set_start + 1..set_start + 5],
        &[
            "",
            "\t\t# in case of Property",
            "\t\tif objectID == 'top_temperature':",
            "\t\t\tself.external_input_1 = obj",
        ]
    );
    let get_start = position(&lines, "\tdef get(self, objectType, time=None, objectID=0):");
    assert_eq!(
        &lines[get_start + 1..get_start + 5],
        &[
            "",
            "\t\t# in case of Field",
            "\t\tif objectID == 'temperature':",
            "\t\t\treturn self.model_1.get(mupif.FieldID.FID_Temperature, time, 0)",
        ]
    );
    assert!(has_line(&lines, "\tdef solveStep(self, tstep, stageID=0, runInBackground=False):"));
    assert!(has_line(&lines, "\t\tself.model_1.set(self.external_input_1, 3)"));
    assert!(has_line(&lines, "\t\tself.model_1.solveStep(tstep)"));
}

#[test]
fn test_model_constructor_forwards_input_file() {
    let mut workflow = create_class_workflow();
    let thermal = workflow.children(workflow.root())[0];
    if let BlockKind::Model(model) = &mut workflow.block_mut(thermal).unwrap().kind {
        model.input_file = Some("inputT13.in".to_string());
        model.input_directory = Some(".".to_string());
    }

    let lines = workflow.generate_workflow_code(CodeForm::Class).unwrap();
    assert!(has_line(
        &lines,
        "\t\tself.model_1 = thermal_nonstat(file='inputT13.in', workdir='.')"
    ));
}

#[test]
fn test_imports_follow_first_use() {
    let mut workflow = Workflow::with_registry("Test", create_registry());
    let root = workflow.root();
    let time_loop = workflow.add_block(root, BlockKind::TimeLoop).unwrap();
    workflow.add_model_block(time_loop, MECHANICAL).unwrap();
    workflow.add_model_block(time_loop, THERMAL).unwrap();
    workflow.add_model_block(time_loop, MECHANICAL).unwrap();

    let lines = workflow.generate_workflow_code(CodeForm::Class).unwrap();
    assert_eq!(
        &lines[..4],
        &[
            "import mupif",
            "from models import mechanical",
            "from models import thermal_nonstat",
            "",
        ]
    );
}

#[test]
fn test_custom_code_is_copied_verbatim() {
    let mut workflow = Workflow::new("Test");
    let root = workflow.root();
    workflow
        .add_block(
            root,
            BlockKind::CustomCode {
                lines: vec!["print('step')".to_string(), "x = [1, 2]".to_string()],
            },
        )
        .unwrap();

    let lines = workflow.generate_workflow_code(CodeForm::Class).unwrap();
    let start = position(&lines, "\t\t# execution code of custom_code_1 (CustomPythonCodeBlock)");
    assert_eq!(
        &lines[start + 1..start + 3],
        &["\t\tprint('step')", "\t\tx = [1, 2]"]
    );
}

#[test]
fn test_empty_workflow_class_is_valid_python() {
    let mut workflow = Workflow::new("Empty");
    let lines = workflow.generate_workflow_code(CodeForm::Class).unwrap();

    assert!(has_line(&lines, "class Empty(mupif.Workflow.Workflow):"));
    let solve = position(&lines, "\tdef solveStep(self, tstep, stageID=0, runInBackground=False):");
    assert_eq!(lines[solve + 1], "\t\tpass");
    let terminate = position(&lines, "\tdef terminate(self):");
    assert_eq!(lines[terminate + 1], "\t\tpass");
}

#[test]
fn test_if_else_block_is_unsupported() {
    let mut workflow = Workflow::new("Test");
    let root = workflow.root();
    workflow.add_block(root, BlockKind::IfElse).unwrap();

    let result = workflow.generate_workflow_code(CodeForm::Class);
    assert!(matches!(result, Err(CodegenError::UnsupportedBlock { .. })));
}

#[test]
fn test_time_loop_without_step_source_fails() {
    let mut workflow = Workflow::new("Test");
    let root = workflow.root();
    workflow.add_block(root, BlockKind::TimeLoop).unwrap();

    let result = workflow.generate_workflow_code(CodeForm::Execution);
    assert!(matches!(result, Err(CodegenError::MissingTimeStepSource(_))));
}

#[test]
fn test_builder_options_shape_the_output() {
    let mut fixture = create_time_loop_workflow(create_registry());
    let generator = CodeGenerator::builder("Cantilever")
        .with_runtime_module("mp")
        .with_time_units("h")
        .build();

    let source = generator
        .generate_source(&mut fixture.workflow, CodeForm::Execution)
        .unwrap();
    assert!(source.starts_with("import mp\n"));
    assert!(source.contains("\nclass Cantilever(mp.Workflow.Workflow):\n    def __init__(self):\n"));
    assert!(source.contains("\n        timeloop_1_time_units = 'h'\n"));
    assert!(source.contains("\n    problem = Cantilever()\n"));
    assert!(!source.contains('\t'));
}
