//! Argument extraction and typed parsing.
//!
//! Raw arguments are first assigned to parameters (positionally for text,
//! by name for slash options and attachments), then every parameter is
//! parsed concurrently and joined into one name-to-value map.

use std::{collections::HashMap, sync::Arc};

use futures::future::{join_all, BoxFuture, FutureExt};
use shared::{
    domain::{Attachment, Channel, ChannelId, ChannelKind, GuildId, Message, Role, User},
    protocol::SlotValue,
};

use crate::{
    command::Parameter,
    error::ArgumentError,
    invocation::{split_all, TokenStream},
    resolve::EntityResolver,
    result::{CommandResult, Failure},
};

pub mod entity;
pub mod raw;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Any,
    Channel,
    Message,
    Role,
    User,
}

/// How a parameter's raw value is converted.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserKind {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
        choices: Vec<String>,
        /// Take the whole remaining input when this is the last positional parameter.
        merge_remainder: bool,
    },
    Boolean,
    Integer {
        min: Option<i64>,
        max: Option<i64>,
        choices: Vec<i64>,
    },
    Float {
        min: Option<f64>,
        max: Option<f64>,
        choices: Vec<f64>,
    },
    Id(IdKind),
    User,
    Role,
    Channel {
        kinds: Vec<ChannelKind>,
    },
    Message,
    Attachment {
        max_size: Option<u64>,
        extensions: Vec<String>,
    },
    List {
        item: Box<ParserKind>,
        min_items: usize,
        max_items: Option<usize>,
    },
}

impl ParserKind {
    pub fn string() -> Self {
        Self::String {
            min_len: None,
            max_len: None,
            choices: Vec::new(),
            merge_remainder: false,
        }
    }

    pub fn text() -> Self {
        Self::String {
            min_len: None,
            max_len: None,
            choices: Vec::new(),
            merge_remainder: true,
        }
    }

    pub fn integer() -> Self {
        Self::Integer {
            min: None,
            max: None,
            choices: Vec::new(),
        }
    }

    pub fn float() -> Self {
        Self::Float {
            min: None,
            max: None,
            choices: Vec::new(),
        }
    }

    pub fn channel(kinds: impl IntoIterator<Item = ChannelKind>) -> Self {
        Self::Channel {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn attachment() -> Self {
        Self::Attachment {
            max_size: None,
            extensions: Vec::new(),
        }
    }

    pub fn list(item: ParserKind) -> Self {
        Self::List {
            item: Box::new(item),
            min_items: 1,
            max_items: None,
        }
    }

    /// Stable name of the kind, used to compare parameters across a chain.
    pub fn tag(&self) -> &'static str {
        match self {
            ParserKind::String { .. } => "string",
            ParserKind::Boolean => "boolean",
            ParserKind::Integer { .. } => "integer",
            ParserKind::Float { .. } => "float",
            ParserKind::Id(_) => "id",
            ParserKind::User => "user",
            ParserKind::Role => "role",
            ParserKind::Channel { .. } => "channel",
            ParserKind::Message => "message",
            ParserKind::Attachment { .. } => "attachment",
            ParserKind::List { .. } => "list",
        }
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self, ParserKind::Attachment { .. })
    }

    fn merges(&self) -> bool {
        match self {
            ParserKind::String {
                merge_remainder, ..
            } => *merge_remainder,
            ParserKind::List { .. } => true,
            _ => false,
        }
    }
}

/// A parsed argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Id(u64),
    User(User),
    Role(Role),
    Channel(Channel),
    Message(Message),
    Attachment(Attachment),
    List(Vec<ArgumentValue>),
}

impl From<&str> for ArgumentValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ArgumentValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ArgumentValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ArgumentValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ArgumentValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Typed view over an [`ArgumentValue`].
pub trait FromArgument: Sized {
    fn from_argument(value: &ArgumentValue) -> Option<Self>;
}

macro_rules! from_argument {
    ($ty:ty, $variant:ident) => {
        impl FromArgument for $ty {
            fn from_argument(value: &ArgumentValue) -> Option<Self> {
                match value {
                    ArgumentValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

from_argument!(String, String);
from_argument!(bool, Boolean);
from_argument!(i64, Integer);
from_argument!(u64, Id);
from_argument!(User, User);
from_argument!(Role, Role);
from_argument!(Channel, Channel);
from_argument!(Message, Message);
from_argument!(Attachment, Attachment);

impl FromArgument for f64 {
    fn from_argument(value: &ArgumentValue) -> Option<Self> {
        match value {
            ArgumentValue::Float(inner) => Some(*inner),
            ArgumentValue::Integer(inner) => Some(*inner as f64),
            _ => None,
        }
    }
}

impl<T: FromArgument> FromArgument for Vec<T> {
    fn from_argument(value: &ArgumentValue) -> Option<Self> {
        match value {
            ArgumentValue::List(items) => items.iter().map(T::from_argument).collect(),
            _ => None,
        }
    }
}

/// Where an invocation's arguments come from.
#[derive(Debug, Clone)]
pub enum ArgumentSource {
    Text {
        tokens: TokenStream,
        attachments: Vec<Attachment>,
    },
    Slash {
        options: HashMap<String, SlotValue>,
        attachments: HashMap<String, Attachment>,
    },
}

/// One parameter's value before conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawArgument {
    Text(String),
    Slot(SlotValue),
    Attachment(Attachment),
}

/// Location data parsers need to resolve references.
#[derive(Clone)]
pub struct ParseScope {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub resolver: Arc<dyn EntityResolver>,
}

/// Pairs raw arguments with `parameters`.
///
/// Positional tokens or attachments left over once every parameter has one
/// fail with [`Failure::ArgumentExtra`], listed in input order.
pub fn assign(
    parameters: &[Parameter],
    source: ArgumentSource,
) -> Result<HashMap<String, RawArgument>, Failure> {
    let mut assigned = HashMap::new();

    match source {
        ArgumentSource::Text {
            mut tokens,
            attachments,
        } => {
            let (files, inputs): (Vec<&Parameter>, Vec<&Parameter>) =
                parameters.iter().partition(|p| p.kind.is_attachment());

            let mut attachments = attachments.into_iter();
            for (parameter, attachment) in files.iter().zip(attachments.by_ref()) {
                assigned.insert(parameter.name.clone(), RawArgument::Attachment(attachment));
            }
            let extra_files: Vec<String> = attachments.map(|a| a.filename).collect();
            if !extra_files.is_empty() {
                return Err(Failure::ArgumentExtra { extra: extra_files });
            }

            let merge_last = inputs.last().is_some_and(|p| p.kind.merges());
            for (index, parameter) in inputs.iter().enumerate() {
                if merge_last && index + 1 == inputs.len() {
                    let rest = tokens.remainder();
                    tokens = TokenStream::default();
                    if !rest.is_empty() {
                        assigned.insert(parameter.name.clone(), RawArgument::Text(rest));
                    }
                    break;
                }
                let Some(token) = tokens.next_token() else {
                    break;
                };
                assigned.insert(parameter.name.clone(), RawArgument::Text(token));
            }

            let extra = tokens.drain_tokens();
            if !extra.is_empty() {
                return Err(Failure::ArgumentExtra { extra });
            }
        }
        ArgumentSource::Slash {
            mut options,
            mut attachments,
        } => {
            for parameter in parameters {
                let raw = if parameter.kind.is_attachment() {
                    attachments
                        .remove(&parameter.name)
                        .map(RawArgument::Attachment)
                } else {
                    options.remove(&parameter.name).map(RawArgument::Slot)
                };
                if let Some(raw) = raw {
                    assigned.insert(parameter.name.clone(), raw);
                }
            }
        }
    }

    Ok(assigned)
}

/// Parses every parameter concurrently.
///
/// When several parameters fail, the first in declaration order decides the
/// result.
pub async fn parse_arguments(
    parameters: &[Parameter],
    mut raw: HashMap<String, RawArgument>,
    scope: &ParseScope,
) -> Result<HashMap<String, ArgumentValue>, CommandResult> {
    let parses = parameters.iter().map(|parameter| {
        let value = raw.remove(&parameter.name);
        parse_parameter(parameter, value, scope)
    });
    let outcomes = join_all(parses).await;

    let mut values = HashMap::new();
    for (parameter, outcome) in parameters.iter().zip(outcomes) {
        if let Some(value) = outcome? {
            values.insert(parameter.name.clone(), value);
        }
    }
    Ok(values)
}

async fn parse_parameter(
    parameter: &Parameter,
    raw: Option<RawArgument>,
    scope: &ParseScope,
) -> Result<Option<ArgumentValue>, CommandResult> {
    let Some(raw) = raw else {
        if parameter.required {
            return Err(CommandResult::Failure(Failure::ArgumentMissing {
                parameter: parameter.name.clone(),
            }));
        }
        return Ok(parameter.default.clone());
    };

    match parse_value(&parameter.kind, raw, scope).await {
        Ok(value) => Ok(Some(value)),
        Err(ArgumentError::Invalid(message)) => {
            Err(CommandResult::Failure(Failure::ArgumentInvalid {
                parameter: parameter.name.clone(),
                message,
            }))
        }
        Err(err @ ArgumentError::Resolver(_)) => Err(CommandResult::exception(
            anyhow::Error::new(err).context(format!("parsing parameter {}", parameter.name)),
        )),
    }
}

fn text_of(raw: RawArgument) -> Result<String, ArgumentError> {
    match raw {
        RawArgument::Text(text) => Ok(text),
        RawArgument::Slot(slot) => Ok(slot.as_raw()),
        RawArgument::Attachment(attachment) => Err(ArgumentError::invalid(format!(
            "Expected text, got attachment {}",
            attachment.filename
        ))),
    }
}

pub fn parse_value<'a>(
    kind: &'a ParserKind,
    input: RawArgument,
    scope: &'a ParseScope,
) -> BoxFuture<'a, Result<ArgumentValue, ArgumentError>> {
    async move {
        match kind {
            ParserKind::String {
                min_len,
                max_len,
                choices,
                ..
            } => {
                let text = raw::check_length(text_of(input)?, *min_len, *max_len)?;
                raw::check_choices(text, choices).map(ArgumentValue::String)
            }
            ParserKind::Boolean => match input {
                RawArgument::Slot(SlotValue::Boolean(value)) => Ok(ArgumentValue::Boolean(value)),
                other => raw::parse_boolean(&text_of(other)?).map(ArgumentValue::Boolean),
            },
            ParserKind::Integer { min, max, choices } => {
                let value = match input {
                    RawArgument::Slot(SlotValue::Integer(value)) => value,
                    other => raw::parse_integer(&text_of(other)?)?,
                };
                let value = raw::check_range(value, *min, *max)?;
                raw::check_choices(value, choices).map(ArgumentValue::Integer)
            }
            ParserKind::Float { min, max, choices } => {
                let value = match input {
                    RawArgument::Slot(SlotValue::Float(value)) => value,
                    RawArgument::Slot(SlotValue::Integer(value)) => value as f64,
                    other => raw::parse_float(&text_of(other)?)?,
                };
                let value = raw::check_range(value, *min, *max)?;
                raw::check_choices(value, choices).map(ArgumentValue::Float)
            }
            ParserKind::Id(id_kind) => {
                entity::parse_id(&text_of(input)?, *id_kind, scope).map(ArgumentValue::Id)
            }
            ParserKind::User => entity::resolve_user(&text_of(input)?, scope)
                .await
                .map(ArgumentValue::User),
            ParserKind::Role => entity::resolve_role(&text_of(input)?, scope)
                .await
                .map(ArgumentValue::Role),
            ParserKind::Channel { kinds } => entity::resolve_channel(&text_of(input)?, kinds, scope)
                .await
                .map(ArgumentValue::Channel),
            ParserKind::Message => entity::resolve_message(&text_of(input)?, scope)
                .await
                .map(ArgumentValue::Message),
            ParserKind::Attachment {
                max_size,
                extensions,
            } => {
                let RawArgument::Attachment(attachment) = input else {
                    return Err(ArgumentError::invalid("Expected an attachment"));
                };
                check_attachment(attachment, *max_size, extensions).map(ArgumentValue::Attachment)
            }
            ParserKind::List {
                item,
                min_items,
                max_items,
            } => {
                let text = text_of(input)?;
                let items = split_all(text.trim());
                if let Some(max) = max_items {
                    if items.len() > *max {
                        return Err(ArgumentError::invalid(format!(
                            "Too many items, must be at most {max}"
                        )));
                    }
                }
                let mut values = Vec::with_capacity(items.len());
                for token in items {
                    values.push(parse_value(item, RawArgument::Text(token), scope).await?);
                }
                if values.len() < *min_items {
                    return Err(ArgumentError::invalid(format!(
                        "Not enough items, must be at least {min_items}"
                    )));
                }
                Ok(ArgumentValue::List(values))
            }
        }
    }
    .boxed()
}

fn check_attachment(
    attachment: Attachment,
    max_size: Option<u64>,
    extensions: &[String],
) -> Result<Attachment, ArgumentError> {
    if let Some(max) = max_size {
        if attachment.size_bytes > max {
            return Err(ArgumentError::invalid(format!(
                "Attachment is larger than the maximum size of {max} bytes"
            )));
        }
    }
    if !extensions.is_empty() {
        let extension = attachment
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        let allowed = extension
            .as_deref()
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        if !allowed {
            return Err(ArgumentError::invalid(format!(
                "Attachment must be one of: {}",
                extensions.join(", ")
            )));
        }
    }
    Ok(attachment)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
