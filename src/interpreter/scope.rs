use crate::ast::Value;
use crate::workflow::{Variable, Workflow, slugify};
use ahash::AHashMap;

/// Name resolution for one workflow run: declared plus derived variables.
pub(super) struct Scope<'w> {
    workflow: &'w Workflow,
    derived: Vec<Variable>,
}

impl<'w> Scope<'w> {
    pub fn new(workflow: &'w Workflow) -> Self {
        Self {
            workflow,
            derived: workflow.derived_variables(),
        }
    }

    fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.workflow.variables.iter().chain(self.derived.iter())
    }

    /// Resolves `key` as a variable id, then a display name, then a slugified name.
    pub fn lookup<'c>(&self, context: &'c AHashMap<String, Value>, key: &str) -> Option<&'c Value> {
        context
            .get(key)
            .or_else(|| {
                self.variables()
                    .find(|v| v.name == key)
                    .and_then(|v| context.get(&v.id))
            })
            .or_else(|| context.get(&slugify(key)))
    }

    /// Context keyed by both ids and display names, for free-text conditions.
    pub fn name_context(&self, context: &AHashMap<String, Value>) -> AHashMap<String, Value> {
        let mut named = AHashMap::with_capacity(context.len() * 2);
        for variable in self.variables() {
            if let Some(value) = context.get(&variable.id) {
                named.insert(variable.name.clone(), value.clone());
            }
        }
        // Ids win over names when the two clash.
        for (id, value) in context {
            named.insert(id.clone(), value.clone());
        }
        named
    }

    pub fn is_declared(&self, id: &str) -> bool {
        self.workflow.variables.iter().any(|v| v.id == id)
    }
}
