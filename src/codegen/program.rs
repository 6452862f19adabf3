use super::blocks::Lowering;
use super::{CodeForm, GeneratorOptions, indent, quote};
use crate::block::BlockId;
use crate::error::CodegenError;
use crate::slot::{DataSlotType, SlotDirection, SlotId};
use crate::workflow::Workflow;
use itertools::Itertools;

/// Assembles the whole program around the per-block code.
pub(super) struct ProgramWriter<'a> {
    workflow: &'a Workflow,
    options: &'a GeneratorOptions,
    form: CodeForm,
    lowering: Lowering<'a>,
}

impl<'a> ProgramWriter<'a> {
    pub fn new(workflow: &'a Workflow, options: &'a GeneratorOptions, form: CodeForm) -> Self {
        Self {
            workflow,
            options,
            form,
            lowering: Lowering::new(workflow, options),
        }
    }

    pub fn write(&self) -> Result<Vec<String>, CodegenError> {
        let rt = &self.options.runtime_module;
        let root = self.workflow.root();

        let mut lines = self.imports();
        lines.push(String::new());
        lines.push(String::new());
        lines.push(format!(
            "class {}({}.Workflow.Workflow):",
            self.options.class_name, rt
        ));

        lines.push(indent(1, "def __init__(self):"));
        lines.push(indent(2, format!("{}.Workflow.Workflow.__init__(self)", rt)));
        if self.form == CodeForm::Class {
            lines.extend(self.metadata());
            lines.extend(self.external_input_init());
        }
        lines.extend(self.lowering.init_code(root, 2)?);

        if self.form == CodeForm::Class {
            lines.push(String::new());
            lines.extend(self.critical_time_step());
            lines.push(String::new());
            lines.extend(self.set_method());
            lines.push(String::new());
            lines.extend(self.get_method());
        }

        lines.push(String::new());
        lines.extend(self.terminate_method());
        lines.push(String::new());
        match self.form {
            CodeForm::Class => {
                lines.push(indent(
                    1,
                    "def solveStep(self, tstep, stageID=0, runInBackground=False):",
                ));
                let body = self.lowering.execution_code(root, 2, "tstep.getTime()", "tstep")?;
                lines.extend(with_pass(body, 2));
            }
            CodeForm::Execution => {
                lines.push(indent(1, "def solve(self, runInBackground=False):"));
                lines.extend(self.lowering.execution_code(root, 2, "None", "None")?);
                lines.push(String::new());
                lines.push(indent(2, "# terminate all models"));
                lines.push(indent(2, "self.terminate()"));
                lines.extend(self.epilogue());
            }
        }
        Ok(lines)
    }

    /// The runtime module, then one import per distinct model class in first-use order.
    fn imports(&self) -> Vec<String> {
        let registry = self.workflow.registry();
        let classes = self
            .workflow
            .models_within(self.workflow.root())
            .into_iter()
            .filter_map(|id| self.workflow.block(id)?.as_model())
            .map(|model| model.class_name.as_str())
            .unique();

        let mut lines = vec![format!("import {}", self.options.runtime_module)];
        for class_name in classes {
            match registry.get(class_name) {
                Some(class) => lines.push(class.import_statement.clone()),
                None => tracing::warn!("no import statement known for model '{}'", class_name),
            }
        }
        lines
    }

    fn connected_externals(&self, direction: SlotDirection) -> Vec<SlotId> {
        self.workflow
            .external_slots(direction)
            .into_iter()
            .filter(|id| self.workflow.slot(*id).is_some_and(|s| s.is_connected()))
            .collect()
    }

    /// Workflow inputs are the external slots feeding values into the tree.
    fn workflow_inputs(&self) -> Vec<SlotId> {
        self.connected_externals(SlotDirection::Output)
    }

    fn workflow_outputs(&self) -> Vec<SlotId> {
        self.connected_externals(SlotDirection::Input)
    }

    fn metadata(&self) -> Vec<String> {
        let describe = |id: &SlotId, as_input: bool| -> Option<String> {
            let slot = self.workflow.slot(*id)?;
            let linked = self.workflow.linked_slots(*id);
            let optional = if as_input {
                linked
                    .iter()
                    .filter_map(|l| self.workflow.slot(*l))
                    .all(|l| l.optional)
            } else {
                true
            };
            let obj_type = slot.obj_type.clone().or_else(|| {
                linked
                    .iter()
                    .filter_map(|l| self.workflow.slot(*l))
                    .find_map(|l| l.obj_type.clone())
            });
            Some(format!(
                "{{'name': {}, 'type': {}, 'optional': {}, 'description': '', 'obj_type': {}, 'obj_id': {}}}",
                quote(&slot.name),
                quote(slot.slot_type.as_str()),
                if optional { "True" } else { "False" },
                obj_type.as_deref().map(quote).unwrap_or_else(|| "None".to_string()),
                slot.obj_id.to_code()
            ))
        };
        let inputs = self
            .workflow_inputs()
            .iter()
            .filter_map(|id| describe(id, true))
            .join(", ");
        let outputs = self
            .workflow_outputs()
            .iter()
            .filter_map(|id| describe(id, false))
            .join(", ");

        vec![
            indent(
                2,
                format!(
                    "self.metadata.update({{'name': {}}})",
                    quote(&self.options.class_name)
                ),
            ),
            indent(2, format!("self.metadata.update({{'inputs': [{}]}})", inputs)),
            indent(2, format!("self.metadata.update({{'outputs': [{}]}})", outputs)),
        ]
    }

    fn external_input_init(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for id in self.workflow_inputs() {
            let Some(code_name) = self.workflow.slot(id).and_then(|s| s.code_name()) else {
                continue;
            };
            lines.push(String::new());
            lines.push(indent(2, "# initialization code of external input"));
            lines.push(indent(2, format!("self.{} = None", code_name)));
            lines.push(indent(
                2,
                "# It should be defined from outside using set() method.",
            ));
        }
        lines
    }

    fn critical_time_step(&self) -> Vec<String> {
        let models: Vec<BlockId> = self
            .workflow
            .children(self.workflow.root())
            .iter()
            .copied()
            .filter(|id| self.workflow.is_model(*id))
            .collect();

        let mut lines = vec![indent(1, "def getCriticalTimeStep(self):")];
        if models.is_empty() {
            lines.push(indent(2, "return None"));
        } else {
            let calls = models
                .iter()
                .map(|m| format!("self.{}.getCriticalTimeStep()", self.lowering.code_name(*m)))
                .join(", ");
            lines.push(indent(2, format!("return min([{}])", calls)));
        }
        lines
    }

    /// Slots grouped by declared type, in the order of [`DataSlotType::ALL`].
    fn by_type(&self, slots: &[SlotId]) -> Vec<(DataSlotType, Vec<SlotId>)> {
        DataSlotType::ALL
            .into_iter()
            .map(|t| {
                let group: Vec<SlotId> = slots
                    .iter()
                    .copied()
                    .filter(|id| self.workflow.slot(*id).is_some_and(|s| s.slot_type == t))
                    .collect();
                (t, group)
            })
            .filter(|(_, group)| !group.is_empty())
            .collect()
    }

    fn set_method(&self) -> Vec<String> {
        let mut lines = vec![
            indent(1, "# set method for all external inputs"),
            indent(1, "def set(self, obj, objectID=0):"),
        ];
        let groups = self.by_type(&self.workflow_inputs());
        if groups.is_empty() {
            lines.push(indent(2, "pass"));
        }
        for (slot_type, group) in groups {
            lines.push(String::new());
            lines.push(indent(2, format!("# in case of {}", slot_type)));
            for id in group {
                let Some(slot) = self.workflow.slot(id) else {
                    continue;
                };
                lines.push(indent(2, format!("if objectID == {}:", slot.obj_id.to_code())));
                lines.push(indent(
                    3,
                    format!("self.{} = obj", slot.code_name().unwrap_or("None")),
                ));
            }
        }
        lines
    }

    fn get_method(&self) -> Vec<String> {
        let mut lines = vec![
            indent(1, "# get method for all external outputs"),
            indent(1, "def get(self, objectType, time=None, objectID=0):"),
        ];
        for (slot_type, group) in self.by_type(&self.workflow_outputs()) {
            lines.push(String::new());
            lines.push(indent(2, format!("# in case of {}", slot_type)));
            for id in group {
                let Some(slot) = self.workflow.slot(id) else {
                    continue;
                };
                lines.push(indent(2, format!("if objectID == {}:", slot.obj_id.to_code())));
                lines.push(indent(
                    3,
                    format!("return {}", self.lowering.linked_value(id, "time")),
                ));
            }
        }
        lines.push(String::new());
        lines.push(indent(2, "return None"));
        lines
    }

    fn terminate_method(&self) -> Vec<String> {
        let mut lines = vec![indent(1, "def terminate(self):")];
        let models = self.workflow.models_within(self.workflow.root());
        if models.is_empty() {
            lines.push(indent(2, "pass"));
        }
        for model in models {
            lines.push(indent(
                2,
                format!("self.{}.terminate()", self.lowering.code_name(model)),
            ));
        }
        lines
    }

    fn epilogue(&self) -> Vec<String> {
        vec![
            String::new(),
            String::new(),
            "if __name__ == '__main__':".to_string(),
            indent(1, format!("problem = {}()", self.options.class_name)),
            indent(1, "problem.solve()"),
            indent(1, "problem.terminate()"),
            String::new(),
            indent(1, "print('Simulation has finished.')"),
        ]
    }
}

/// Appends `pass` when a method body holds nothing but blank lines and comments.
fn with_pass(mut body: Vec<String>, level: usize) -> Vec<String> {
    let has_code = body.iter().any(|line| {
        let line = line.trim_start();
        !line.is_empty() && !line.starts_with('#')
    });
    if !has_code {
        body.push(indent(level, "pass"));
    }
    body
}
