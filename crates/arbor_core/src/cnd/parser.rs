//! Recursive-descent parser producing type definitions.

use crate::cnd::lexer::{Lexer, Token, TokenKind};
use crate::error::{CoreError, CoreResult};
use crate::node::ValueType;
use crate::nodetype::{
    ChildNodeDefinition, Multiplicity, PropertyDefinition, QualifiedName, TypeDefinition, RESIDUAL,
};

/// Namespaces and types declared in one CND text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CndDocument {
    /// Declared namespaces, `(prefix, uri)`, in order.
    pub namespaces: Vec<(String, String)>,
    /// Declared types, in order.
    pub types: Vec<TypeDefinition>,
}

/// On-parent-version behaviours. Accepted and ignored.
const OPV_KEYWORDS: [&str; 7] = [
    "copy",
    "version",
    "initialize",
    "compute",
    "ignore",
    "abort",
    "opv",
];

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(src: &str) -> CoreResult<Self> {
        Ok(Self {
            tokens: Lexer::tokenize(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + ahead).min(last)].kind
    }

    fn line(&self) -> usize {
        let last = self.tokens.len() - 1;
        self.tokens[self.pos.min(last)].line
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if kind != TokenKind::Eof {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> CoreError {
        CoreError::syntax(self.line(), message)
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> CoreResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", self.peek().describe())))
        }
    }

    fn text(&mut self, what: &str) -> CoreResult<String> {
        match self.peek().text() {
            Some(text) => {
                let text = text.to_string();
                self.advance();
                Ok(text)
            }
            None => Err(self.error(format!("expected {what}, found {}", self.peek().describe()))),
        }
    }

    fn type_name(&mut self) -> CoreResult<QualifiedName> {
        let line = self.line();
        let text = self.text("a type name")?;
        QualifiedName::parse(&text)
            .map_err(|_| CoreError::syntax(line, format!("'{text}' is not a prefixed type name")))
    }

    /// True if the current word is one of `keywords`, ignoring case.
    fn at_keyword(&self, keywords: &[&str]) -> bool {
        matches!(self.peek(), TokenKind::Word(w) if keywords.iter().any(|k| k.eq_ignore_ascii_case(w)))
    }

    /// `<` opening a namespace mapping rather than a value constraint.
    fn at_namespace(&self) -> bool {
        *self.peek() == TokenKind::Lt
            && self.peek_at(1).text().is_some()
            && *self.peek_at(2) == TokenKind::Eq
    }

    pub(crate) fn document(mut self) -> CoreResult<CndDocument> {
        let mut doc = CndDocument::default();
        loop {
            match self.peek() {
                TokenKind::Eof => return Ok(doc),
                TokenKind::Lt => {
                    let (prefix, uri) = self.namespace()?;
                    match doc.namespaces.iter().find(|(p, _)| *p == prefix) {
                        Some((_, existing)) if *existing != uri => {
                            return Err(self.error(format!(
                                "prefix '{prefix}' mapped to both '{existing}' and '{uri}'"
                            )))
                        }
                        Some(_) => {}
                        None => doc.namespaces.push((prefix, uri)),
                    }
                }
                TokenKind::LeftBracket => {
                    let line = self.line();
                    let def = self.node_type()?;
                    if doc.types.iter().any(|t| t.name == def.name) {
                        return Err(CoreError::syntax(line, format!("type {} declared twice", def.name)));
                    }
                    doc.types.push(def);
                }
                other => {
                    return Err(self.error(format!(
                        "expected '<' or '[', found {}",
                        other.describe()
                    )))
                }
            }
        }
    }

    fn namespace(&mut self) -> CoreResult<(String, String)> {
        self.expect(&TokenKind::Lt, "'<'")?;
        let line = self.line();
        let prefix = self.text("a namespace prefix")?;
        if !crate::nodetype::is_prefix(&prefix) {
            return Err(CoreError::syntax(line, format!("'{prefix}' is not a valid prefix")));
        }
        self.expect(&TokenKind::Eq, "'='")?;
        let uri = self.text("a namespace URI")?;
        self.expect(&TokenKind::Gt, "'>'")?;
        Ok((prefix, uri))
    }

    fn node_type(&mut self) -> CoreResult<TypeDefinition> {
        self.expect(&TokenKind::LeftBracket, "'['")?;
        let mut def = TypeDefinition::new(self.type_name()?);
        self.expect(&TokenKind::RightBracket, "']'")?;

        if self.eat(&TokenKind::Gt) {
            loop {
                def.supertypes.push(self.type_name()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        loop {
            if self.at_keyword(&["orderable", "ord", "o"]) {
                self.advance();
                def.orderable = true;
            } else if self.at_keyword(&["mixin", "mix", "m"]) {
                self.advance();
                def.is_mixin = true;
            } else if self.at_keyword(&["abstract", "abs", "a"]) {
                self.advance();
                def.is_abstract = true;
            } else if self.at_keyword(&["noquery", "nq", "query", "q"]) {
                self.advance();
            } else if self.at_keyword(&["primaryitem"]) || *self.peek() == TokenKind::Bang {
                self.advance();
                def.primary_item = Some(self.text("a primary item name")?);
            } else {
                break;
            }
        }

        loop {
            match self.peek() {
                TokenKind::Minus => {
                    self.advance();
                    let prop = self.property(&mut def.primary_item)?;
                    def.properties.push(prop);
                }
                TokenKind::Plus => {
                    self.advance();
                    let child = self.child(&mut def.primary_item)?;
                    def.children.push(child);
                }
                _ => return Ok(def),
            }
        }
    }

    fn item_name(&mut self) -> CoreResult<String> {
        if self.eat(&TokenKind::Star) {
            Ok(RESIDUAL.to_string())
        } else {
            self.text("an item name")
        }
    }

    fn property(&mut self, primary_item: &mut Option<String>) -> CoreResult<PropertyDefinition> {
        let name = self.item_name()?;
        let mut prop = PropertyDefinition::new(name, ValueType::String);

        if self.eat(&TokenKind::LeftParen) {
            prop.required_type = if self.eat(&TokenKind::Star) {
                ValueType::Undefined
            } else {
                let line = self.line();
                let text = self.text("a property type")?;
                ValueType::parse(&text)
                    .ok_or_else(|| CoreError::syntax(line, format!("unknown property type '{text}'")))?
            };
            self.expect(&TokenKind::RightParen, "')'")?;
        }

        loop {
            if self.eat(&TokenKind::Eq) {
                prop.default_values = self.text_list("a default value")?;
            } else if *self.peek() == TokenKind::Lt && !self.at_namespace() {
                self.advance();
                prop.value_constraints = self.text_list("a value constraint")?;
            } else if self.at_keyword(&["mandatory", "man", "m"]) {
                self.advance();
                prop.mandatory = true;
            } else if self.at_keyword(&["autocreated", "aut", "a"]) {
                self.advance();
                prop.autocreated = true;
            } else if self.at_keyword(&["protected", "pro", "p"]) {
                self.advance();
                prop.protected = true;
            } else if self.at_keyword(&["multiple", "mul"]) || *self.peek() == TokenKind::Star {
                self.advance();
                prop.multiplicity = Multiplicity::Multiple;
            } else if self.at_keyword(&["primary", "pri"]) || *self.peek() == TokenKind::Bang {
                self.advance();
                *primary_item = Some(prop.name.clone());
            } else if self.at_keyword(&["queryops", "qop"]) {
                self.advance();
                if matches!(self.peek(), TokenKind::Quoted(_)) {
                    self.advance();
                }
            } else if self.at_keyword(&["nofulltext", "nof", "noqueryorder", "nqord"]) {
                self.advance();
            } else if self.at_keyword(&OPV_KEYWORDS) {
                self.advance();
            } else {
                return Ok(prop);
            }
        }
    }

    fn child(&mut self, primary_item: &mut Option<String>) -> CoreResult<ChildNodeDefinition> {
        let mut child = ChildNodeDefinition::new(self.item_name()?);

        if self.eat(&TokenKind::LeftParen) {
            loop {
                child.required_primary_types.push(self.type_name()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RightParen, "')'")?;
        }
        if self.eat(&TokenKind::Eq) {
            child.default_primary_type = Some(self.type_name()?);
        }

        loop {
            if self.at_keyword(&["mandatory", "man", "m"]) {
                self.advance();
                child.mandatory = true;
            } else if self.at_keyword(&["autocreated", "aut", "a"]) {
                self.advance();
                child.autocreated = true;
            } else if self.at_keyword(&["protected", "pro", "p"]) {
                self.advance();
                child.protected = true;
            } else if self.at_keyword(&["sns", "multiple", "mul"]) || *self.peek() == TokenKind::Star {
                self.advance();
                child.same_name_siblings = true;
            } else if self.at_keyword(&["primary", "pri"]) || *self.peek() == TokenKind::Bang {
                self.advance();
                *primary_item = Some(child.name.clone());
            } else if self.at_keyword(&OPV_KEYWORDS) {
                self.advance();
            } else {
                return Ok(child);
            }
        }
    }

    fn text_list(&mut self, what: &str) -> CoreResult<Vec<String>> {
        let mut values = vec![self.text(what)?];
        while self.eat(&TokenKind::Comma) {
            values.push(self.text(what)?);
        }
        Ok(values)
    }
}
