//! A small XML-RPC codec.
//!
//! The CCU speaks plain XML-RPC over HTTP, but its dialect is loose: integers
//! arrive as `<int>` or `<i4>`, struct values sometimes omit the inner type
//! element entirely (bare text inside `<value>` is a string per the XML-RPC
//! spec), and numeric paramset values switch between int and double depending
//! on firmware. Off-the-shelf strictness works poorly against that, so the
//! writer and parser here are hand-rolled against the subset the hub emits.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::trace;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Double(n) => Some(*n as i64),
            _ => None,
        }
    }

    /// Numeric coercion: the hub reports some double parameters as ints.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Double(n) => serializer.serialize_f64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => serializer.collect_seq(items),
            Value::Struct(members) => serializer.collect_map(members),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Response {
    Success(Value),
    Fault { code: i64, message: String },
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("response ended in the middle of `{0}`")]
    UnexpectedEnd(&'static str),
    #[error("expected `<{0}>` near `{1}`")]
    ExpectedTag(&'static str, String),
    #[error("`{1}` is not a valid <{0}> value")]
    InvalidScalar(&'static str, String),
    #[error("unsupported value type `<{0}>`")]
    UnsupportedType(String),
    #[error("fault response is missing `{0}`")]
    MalformedFault(&'static str),
}

/// Serialize a `<methodCall>` document.
pub fn write_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    escape_into(&mut out, method);
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(n) => {
            let _ = write!(out, "<i4>{n}</i4>");
        }
        Value::Double(n) => {
            // Always keep a decimal point so the hub does not reinterpret
            // whole-number doubles as ints.
            if n.fract() == 0.0 && n.is_finite() {
                let _ = write!(out, "<double>{n:.1}</double>");
            } else {
                let _ = write!(out, "<double>{n}</double>");
            }
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::String(s) => {
            out.push_str("<string>");
            escape_into(out, s);
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                escape_into(out, name);
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}

/// Parse a `<methodResponse>` document into either the result value or the
/// hub's fault code and message.
pub fn parse_response(text: &str) -> Result<Response, Error> {
    trace!(message = "parsing response", len = text.len());
    let mut reader = Reader { rest: text };
    reader.skip_prolog();
    reader.expect_open("methodResponse")?;
    if reader.try_open("fault") {
        let value = reader.parse_value()?;
        reader.expect_close("fault")?;
        reader.expect_close("methodResponse")?;
        return fault_from_value(value);
    }
    reader.expect_open("params")?;
    reader.expect_open("param")?;
    let value = reader.parse_value()?;
    reader.expect_close("param")?;
    reader.expect_close("params")?;
    reader.expect_close("methodResponse")?;
    Ok(Response::Success(value))
}

fn fault_from_value(value: Value) -> Result<Response, Error> {
    let Value::Struct(mut members) = value else {
        return Err(Error::MalformedFault("a struct value"));
    };
    let code = members
        .get("faultCode")
        .and_then(Value::as_i64)
        .ok_or(Error::MalformedFault("faultCode"))?;
    let message = match members.remove("faultString") {
        Some(Value::String(s)) => s,
        _ => return Err(Error::MalformedFault("faultString")),
    };
    Ok(Response::Fault { code, message })
}

struct Reader<'a> {
    rest: &'a str,
}

impl<'a> Reader<'a> {
    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn skip_prolog(&mut self) {
        self.skip_whitespace();
        if let Some(after) = self.rest.strip_prefix("<?xml") {
            if let Some((_, rest)) = after.split_once("?>") {
                self.rest = rest;
            }
        }
    }

    fn try_open(&mut self, tag: &str) -> bool {
        self.skip_whitespace();
        let mut opening = String::with_capacity(tag.len() + 2);
        let _ = write!(opening, "<{tag}>");
        if let Some(rest) = self.rest.strip_prefix(&opening) {
            self.rest = rest;
            return true;
        }
        false
    }

    fn expect_open(&mut self, tag: &'static str) -> Result<(), Error> {
        if self.try_open(tag) {
            return Ok(());
        }
        Err(self.expected(tag))
    }

    fn expect_close(&mut self, tag: &'static str) -> Result<(), Error> {
        self.skip_whitespace();
        let mut closing = String::with_capacity(tag.len() + 3);
        let _ = write!(closing, "</{tag}>");
        match self.rest.strip_prefix(&closing) {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(self.expected(tag)),
        }
    }

    fn expected(&self, tag: &'static str) -> Error {
        let context = self.rest.chars().take(32).collect::<String>();
        Error::ExpectedTag(tag, context)
    }

    /// Text content up to the next `<`, entities decoded.
    fn take_text(&mut self, context: &'static str) -> Result<String, Error> {
        let end = self.rest.find('<').ok_or(Error::UnexpectedEnd(context))?;
        let (raw, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(unescape(raw))
    }

    fn parse_value(&mut self) -> Result<Value, Error> {
        self.expect_open("value")?;
        self.skip_whitespace();
        let value = if self.try_open("i4") {
            let value = self.parse_scalar("i4")?;
            self.expect_close("i4")?;
            value
        } else if self.try_open("int") {
            let value = self.parse_scalar("int")?;
            self.expect_close("int")?;
            value
        } else if self.try_open("double") {
            let text = self.take_text("double")?;
            let n = text
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::InvalidScalar("double", text.clone()))?;
            self.expect_close("double")?;
            Value::Double(n)
        } else if self.try_open("boolean") {
            let text = self.take_text("boolean")?;
            let value = match text.trim() {
                "0" => Value::Bool(false),
                "1" => Value::Bool(true),
                _ => return Err(Error::InvalidScalar("boolean", text)),
            };
            self.expect_close("boolean")?;
            value
        } else if self.try_open("string") {
            let text = self.take_text("string")?;
            self.expect_close("string")?;
            Value::String(text)
        } else if self.try_open("array") {
            self.expect_open("data")?;
            let mut items = Vec::new();
            loop {
                self.skip_whitespace();
                if !self.rest.starts_with("<value>") {
                    break;
                }
                items.push(self.parse_value()?);
            }
            self.expect_close("data")?;
            self.expect_close("array")?;
            Value::Array(items)
        } else if self.try_open("struct") {
            let mut members = BTreeMap::new();
            while self.try_open("member") {
                self.expect_open("name")?;
                let name = self.take_text("name")?;
                self.expect_close("name")?;
                let value = self.parse_value()?;
                self.expect_close("member")?;
                members.insert(name, value);
            }
            self.expect_close("struct")?;
            Value::Struct(members)
        } else if self.rest.starts_with("</value>") {
            // `<value></value>` -- an empty string.
            Value::String(String::new())
        } else if self.rest.starts_with('<') {
            let tag = self.rest[1..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '.')
                .collect::<String>();
            return Err(Error::UnsupportedType(tag));
        } else {
            // Untyped content inside <value> is a string.
            Value::String(self.take_text("value")?)
        };
        self.expect_close("value")?;
        Ok(value)
    }

    fn parse_scalar(&mut self, context: &'static str) -> Result<Value, Error> {
        let text = self.take_text(context)?;
        let n = text
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::InvalidScalar(context, text.clone()))?;
        Ok(Value::Int(n))
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(index) = rest.find('&') {
        out.push_str(&rest[..index]);
        rest = &rest[index..];
        let known = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ];
        match known.iter().find_map(|(entity, c)| Some((rest.strip_prefix(entity)?, *c))) {
            Some((after, c)) => {
                out.push(c);
                rest = after;
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
