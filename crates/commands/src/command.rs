use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use shared::protocol::InvocationStyle;

use crate::{
    access::Group,
    error::InvalidChainError,
    handler::{InvocationHandler, ResultHandler},
    invocation::Invocation,
    parse::{ArgumentValue, ParserKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Global,
    /// Only valid inside a guild.
    Guild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSettings {
    pub age_restricted: bool,
    pub owner_only: bool,
    pub server_owner_only: bool,
    pub callable: bool,
    pub inherit_settings: bool,
    pub require_parent_groups: bool,
    pub invoke_parent: bool,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            age_restricted: false,
            owner_only: false,
            server_owner_only: false,
            callable: true,
            inherit_settings: false,
            require_parent_groups: true,
            invoke_parent: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub default: Option<ArgumentValue>,
    pub kind: ParserKind,
}

impl Parameter {
    pub fn required(name: impl Into<String>, kind: ParserKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: true,
            default: None,
            kind,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParserKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn with_default(mut self, default: ArgumentValue) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A registered command node.
#[derive(Clone)]
pub struct Command {
    pub id: String,
    pub parent: Invocation,
    pub name: String,
    pub scope: Scope,
    pub settings: CommandSettings,
    pub group: Group,
    pub parameters: Vec<Parameter>,
    pub styles: HashSet<InvocationStyle>,
    pub handler: Option<Arc<dyn InvocationHandler>>,
    pub result_handlers: Vec<Arc<dyn ResultHandler>>,
}

impl Command {
    /// A callable, global command at `path` available to every style.
    pub fn new(id: impl Into<String>, path: Invocation) -> Self {
        let parent = path.parent().unwrap_or_default();
        let name = path.name().unwrap_or_default().to_string();
        Self {
            id: id.into(),
            parent,
            name,
            scope: Scope::Global,
            settings: CommandSettings::default(),
            group: Group::everyone(),
            parameters: Vec::new(),
            styles: [InvocationStyle::Text, InvocationStyle::Slash]
                .into_iter()
                .collect(),
            handler: None,
            result_handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invocation(&self) -> Invocation {
        self.parent.child(self.name.clone())
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_settings(mut self, settings: CommandSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.group = group;
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_styles(mut self, styles: impl IntoIterator<Item = InvocationStyle>) -> Self {
        self.styles = styles.into_iter().collect();
        self
    }

    pub fn with_handler(mut self, handler: impl InvocationHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn with_result_handler(mut self, handler: impl ResultHandler + 'static) -> Self {
        self.result_handlers.push(Arc::new(handler));
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("invocation", &self.invocation().to_string())
            .field("scope", &self.scope)
            .field("settings", &self.settings)
            .field("group", &self.group)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// Read-only command lookup.
pub trait Registry: Send + Sync {
    fn lookup(&self, invocation: &Invocation, style: InvocationStyle) -> Option<Arc<Command>>;
}

/// A registry kept entirely in memory.
#[derive(Default)]
pub struct MemoryRegistry {
    commands: HashMap<Invocation, Arc<Command>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, command: Command) -> Self {
        self.insert(command);
        self
    }

    /// Registers `command`, replacing any previous command at the same path.
    pub fn insert(&mut self, command: Command) -> Option<Arc<Command>> {
        self.commands.insert(command.invocation(), Arc::new(command))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Registry for MemoryRegistry {
    fn lookup(&self, invocation: &Invocation, style: InvocationStyle) -> Option<Arc<Command>> {
        self.commands
            .get(invocation)
            .filter(|command| command.styles.contains(&style))
            .cloned()
    }
}

/// The commands whose handlers run for the invoked (last) command, outermost
/// first.
///
/// Walks back while `invoke_parent` holds and checks that each ancestor's
/// parameters are compatible with the invoked command's.
pub fn handling_order(chain: &[Arc<Command>]) -> Result<Vec<Arc<Command>>, InvalidChainError> {
    let Some(invoked) = chain.last() else {
        return Err(InvalidChainError::Empty);
    };

    let mut order = vec![invoked.clone()];
    for window in chain.windows(2).rev() {
        let [ancestor, child] = window else {
            continue;
        };
        if !child.settings.invoke_parent {
            break;
        }
        check_compatible(ancestor, invoked)?;
        order.push(ancestor.clone());
    }
    order.reverse();
    Ok(order)
}

fn check_compatible(ancestor: &Command, invoked: &Command) -> Result<(), InvalidChainError> {
    for parameter in &ancestor.parameters {
        match invoked.parameter(&parameter.name) {
            Some(own) if own.kind.tag() != parameter.kind.tag() => {
                return Err(InvalidChainError::ParameterKind {
                    ancestor: ancestor.id.clone(),
                    command: invoked.id.clone(),
                    parameter: parameter.name.clone(),
                    expected: parameter.kind.tag(),
                    found: own.kind.tag(),
                });
            }
            Some(own) if parameter.required && !own.required && own.default.is_none() => {
                return Err(InvalidChainError::ParameterOptional {
                    ancestor: ancestor.id.clone(),
                    command: invoked.id.clone(),
                    parameter: parameter.name.clone(),
                });
            }
            None if parameter.required => {
                return Err(InvalidChainError::ParameterOptional {
                    ancestor: ancestor.id.clone(),
                    command: invoked.id.clone(),
                    parameter: parameter.name.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Verifies that the names matched for `chain` spell the invoked command's
/// own path.
pub fn check_normalized(chain: &[Arc<Command>]) -> Result<(), InvalidChainError> {
    let Some(invoked) = chain.last() else {
        return Err(InvalidChainError::Empty);
    };
    let normalized = Invocation::of(chain.iter().map(|command| command.name.clone()));
    let declared = invoked.invocation();
    if normalized != declared {
        return Err(InvalidChainError::Normalization {
            command: invoked.id.clone(),
            normalized: normalized.to_string(),
            declared: declared.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/command_tests.rs"]
mod tests;
