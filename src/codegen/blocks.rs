use super::{GeneratorOptions, float_literal, indent, quote};
use crate::block::{
    Block, BlockId, BlockKind, MAX_DT_SLOT, START_TIME_SLOT, TARGET_TIME_SLOT, VALUE_SLOT,
    VariableKind,
};
use crate::error::CodegenError;
use crate::slot::{SlotDirection, SlotId};
use crate::workflow::Workflow;

/// Per-block lowering of init and execution code.
pub(super) struct Lowering<'a> {
    pub workflow: &'a Workflow,
    pub options: &'a GeneratorOptions,
}

impl<'a> Lowering<'a> {
    pub fn new(workflow: &'a Workflow, options: &'a GeneratorOptions) -> Self {
        Self { workflow, options }
    }

    pub fn code_name(&self, block: BlockId) -> &'a str {
        self.workflow
            .block(block)
            .and_then(Block::code_name)
            .unwrap_or("None")
    }

    fn header(&self, block: &Block, code_name: &str, what: &str, level: usize) -> Vec<String> {
        vec![
            indent(level, ""),
            indent(level, format!("# {} code of {} ({})", what, code_name, block.name)),
        ]
    }

    fn unsupported(&self, block: &Block) -> CodegenError {
        CodegenError::UnsupportedBlock {
            block: block.name.clone(),
            kind: block.kind.class_name().to_string(),
        }
    }

    /// Whether the single `value` slot of a variable block has a link.
    fn value_connected(&self, block: BlockId) -> bool {
        self.workflow
            .slot_by_name(block, VALUE_SLOT)
            .and_then(|slot| self.workflow.slot(slot))
            .is_some_and(|slot| slot.is_connected())
    }

    /// One-time setup code of `block` and everything below it.
    pub fn init_code(&self, id: BlockId, level: usize) -> Result<Vec<String>, CodegenError> {
        let Some(block) = self.workflow.block(id) else {
            return Ok(Vec::new());
        };
        let name = self.code_name(id);
        let rt = &self.options.runtime_module;

        let mut lines = Vec::new();
        match &block.kind {
            BlockKind::IfElse => return Err(self.unsupported(block)),
            BlockKind::Workflow | BlockKind::Sequential | BlockKind::TimeLoop => {
                for child in block.children() {
                    lines.extend(self.init_code(*child, level)?);
                }
            }
            BlockKind::Model(model) => {
                let mut args = Vec::new();
                if let Some(file) = &model.input_file {
                    args.push(format!("file={}", quote(file)));
                }
                if let Some(dir) = &model.input_directory {
                    args.push(format!("workdir={}", quote(dir)));
                }
                lines.extend(self.header(block, name, "initialization", level));
                lines.push(indent(
                    level,
                    format!("self.{} = {}({})", name, model.class_name, args.join(", ")),
                ));
            }
            BlockKind::Variable(variable) => {
                if !self.value_connected(id) {
                    return Ok(lines);
                }
                let value = match variable {
                    VariableKind::ConstantProperty {
                        value,
                        property_id,
                        value_type,
                        units,
                    } => format!(
                        "{}.Property.ConstantProperty({}, {}, {}, {}, None, 0)",
                        rt,
                        tuple_literal(value),
                        property_id,
                        value_type,
                        quote(units)
                    ),
                    VariableKind::ConstantPhysicalQuantity { value, units } => format!(
                        "{}.Physics.PhysicalQuantities.PhysicalQuantity({}, {})",
                        rt,
                        float_literal(*value),
                        quote(units)
                    ),
                    VariableKind::Float { value } => float_literal(*value),
                    VariableKind::CustomName { .. } => "None".to_string(),
                };
                lines.extend(self.header(block, name, "initialization", level));
                lines.push(indent(level, format!("self.{} = {}", name, value)));
            }
            BlockKind::CustomCode { .. } => {}
        }
        Ok(lines)
    }

    /// Per-invocation code of `block`, parameterized by the current time expression and
    /// time step variable of the enclosing scope.
    pub fn execution_code(
        &self,
        id: BlockId,
        level: usize,
        time: &str,
        tstep: &str,
    ) -> Result<Vec<String>, CodegenError> {
        let Some(block) = self.workflow.block(id) else {
            return Ok(Vec::new());
        };
        let name = self.code_name(id);

        let mut lines = Vec::new();
        match &block.kind {
            BlockKind::IfElse => return Err(self.unsupported(block)),
            BlockKind::Workflow | BlockKind::Sequential => {
                for child in block.children() {
                    lines.extend(self.execution_code(*child, level, time, tstep)?);
                }
            }
            BlockKind::TimeLoop => lines.extend(self.time_loop(block, id, level, time)?),
            BlockKind::Model(_) => {
                lines.extend(self.header(block, name, "execution", level));
                for slot_id in block.slots() {
                    let Some(slot) = self.workflow.slot(*slot_id) else {
                        continue;
                    };
                    if slot.direction() != SlotDirection::Input || !slot.is_connected() {
                        continue;
                    }
                    lines.push(indent(
                        level,
                        format!(
                            "self.{}.set({}, {})",
                            name,
                            self.linked_value(*slot_id, time),
                            slot.obj_id.to_code()
                        ),
                    ));
                }
                lines.push(indent(level, format!("self.{}.solveStep({})", name, tstep)));
            }
            BlockKind::Variable(VariableKind::CustomName { .. }) => {
                if let Some(slot) = self.workflow.slot_by_name(id, VALUE_SLOT) {
                    if self.value_connected(id) {
                        lines.extend(self.header(block, name, "execution", level));
                        lines.push(indent(
                            level,
                            format!("self.{} = {}", name, self.linked_value(slot, time)),
                        ));
                    }
                }
            }
            BlockKind::Variable(_) => {}
            BlockKind::CustomCode { lines: code } => {
                lines.extend(self.header(block, name, "execution", level));
                lines.extend(code.iter().map(|line| indent(level, line)));
            }
        }
        Ok(lines)
    }

    fn time_loop(
        &self,
        block: &Block,
        id: BlockId,
        level: usize,
        outer_time: &str,
    ) -> Result<Vec<String>, CodegenError> {
        let name = self.code_name(id);
        let input = |slot: &str| {
            self.workflow
                .slot_by_name(id, slot)
                .map(|s| self.linked_value(s, outer_time))
                .unwrap_or_else(|| "None".to_string())
        };

        let mut dt_sources = Vec::new();
        if let Some(max_dt) = self.workflow.slot_by_name(id, MAX_DT_SLOT) {
            if self.workflow.slot(max_dt).is_some_and(|s| s.is_connected()) {
                dt_sources.push(self.linked_value(max_dt, outer_time));
            }
        }
        dt_sources.extend(
            self.workflow
                .models_within(id)
                .into_iter()
                .map(|m| format!("self.{}.getCriticalTimeStep()", self.code_name(m))),
        );
        if dt_sources.is_empty() {
            return Err(CodegenError::MissingTimeStepSource(name.to_string()));
        }

        let time = format!("{}_time", name);
        let target = format!("{}_target_time", name);
        let units = format!("{}_time_units", name);
        let compute = format!("{}_compute", name);
        let step_number = format!("{}_time_step_number", name);
        let dt = format!("{}_dt", name);
        let tstep = format!("{}_time_step", name);
        let body = level + 1;

        let mut lines = self.header(block, name, "execution", level);
        lines.extend([
            indent(level, format!("{} = {}", units, quote(&self.options.time_units))),
            indent(level, format!("{} = {}", time, input(START_TIME_SLOT))),
            indent(level, format!("{} = {}", target, input(TARGET_TIME_SLOT))),
            indent(level, format!("{} = True", compute)),
            indent(level, format!("{} = 0", step_number)),
            indent(level, format!("while {}:", compute)),
            indent(body, format!("{} += 1", step_number)),
            indent(body, ""),
            indent(body, format!("{} = min([{}])", dt, dt_sources.join(", "))),
            indent(body, format!("{} = min({}+{}, {})", time, time, dt, target)),
            indent(body, ""),
            indent(
                body,
                format!(
                    "if {}.inUnitsOf({}).getValue() + {} > {}.inUnitsOf({}).getValue():",
                    time,
                    units,
                    float_literal(self.options.time_tolerance),
                    target,
                    units
                ),
            ),
            indent(body + 1, format!("{} = False", compute)),
            indent(body, ""),
            indent(
                body,
                format!(
                    "{} = {}.TimeStep.TimeStep({}, {}, {}, n={})",
                    tstep, self.options.runtime_module, time, dt, target, step_number
                ),
            ),
        ]);

        let child_time = format!("{}.getTime()", tstep);
        for child in block.children() {
            lines.extend(self.execution_code(*child, body, &child_time, &tstep)?);
        }
        Ok(lines)
    }

    /// The expression reading the value on the other end of an input-direction slot.
    pub fn linked_value(&self, slot: SlotId, time: &str) -> String {
        self.workflow
            .linked_slot(slot)
            .map(|source| self.output_getter(source, time))
            .unwrap_or_else(|| "None".to_string())
    }

    /// The expression producing the value of an output-direction slot.
    pub fn output_getter(&self, slot: SlotId, time: &str) -> String {
        let Some(data_slot) = self.workflow.slot(slot) else {
            return "None".to_string();
        };
        let Some(owner) = self.workflow.block(data_slot.owner) else {
            return "None".to_string();
        };
        match &owner.kind {
            BlockKind::Model(_) => format!(
                "self.{}.get({}, {}, {})",
                self.code_name(data_slot.owner),
                data_slot.obj_type.as_deref().unwrap_or("None"),
                time,
                data_slot.obj_id.to_code()
            ),
            BlockKind::Variable(VariableKind::CustomName { .. }) => "None".to_string(),
            BlockKind::Variable(_) => format!("self.{}", self.code_name(data_slot.owner)),
            BlockKind::Workflow if data_slot.is_external() => format!(
                "self.{}",
                data_slot.code_name().unwrap_or("None")
            ),
            _ => "None".to_string(),
        }
    }
}

fn tuple_literal(values: &[f64]) -> String {
    match values {
        [single] => format!("({},)", float_literal(*single)),
        _ => format!(
            "({})",
            values
                .iter()
                .map(|v| float_literal(*v))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_values_become_one_element_tuples() {
        assert_eq!(tuple_literal(&[0.0]), "(0.0,)");
        assert_eq!(tuple_literal(&[1.0, 2.5]), "(1.0, 2.5)");
        assert_eq!(tuple_literal(&[]), "()");
    }
}
