//! Search filters and the builder that assembles them while a SearchRequest
//! is decoded.

use crate::error::DecodeError;
use crate::ldap::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValueAssertion {
    pub attribute: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringFilter {
    pub attribute: String,
    pub initial: Option<Value>,
    pub any: Vec<Value>,
    pub final_: Option<Value>,
}

impl SubstringFilter {
    pub fn is_empty(&self) -> bool {
        self.initial.is_none() && self.any.is_empty() && self.final_.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensibleMatch {
    pub matching_rule: Option<String>,
    pub attribute: Option<String>,
    pub value: Value,
    pub dn_attributes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality(AttributeValueAssertion),
    Substrings(SubstringFilter),
    GreaterOrEqual(AttributeValueAssertion),
    LessOrEqual(AttributeValueAssertion),
    Present(String),
    Approx(AttributeValueAssertion),
    Extensible(ExtensibleMatch),
}

impl Filter {
    pub fn equality(attribute: &str, value: impl Into<Value>) -> Self {
        Filter::Equality(AttributeValueAssertion {
            attribute: attribute.to_owned(),
            value: value.into(),
        })
    }

    pub fn present(attribute: &str) -> Self {
        Filter::Present(attribute.to_owned())
    }

    pub fn not(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Equality,
    Substrings,
    GreaterOrEqual,
    LessOrEqual,
    Approx,
    Extensible,
}

/// Fields of a leaf collected so far; which ones are required depends on
/// the kind.
#[derive(Debug)]
pub struct PendingLeaf {
    pub kind: LeafKind,
    pub attribute: Option<String>,
    pub value: Option<Value>,
    pub initial: Option<Value>,
    pub any: Vec<Value>,
    pub final_: Option<Value>,
    pub matching_rule: Option<String>,
    pub dn_attributes: bool,
}

impl PendingLeaf {
    fn new(kind: LeafKind) -> Self {
        Self {
            kind,
            attribute: None,
            value: None,
            initial: None,
            any: Vec::new(),
            final_: None,
            matching_rule: None,
            dn_attributes: false,
        }
    }

    fn into_filter(self) -> Result<Filter, DecodeError> {
        let ava = |attribute: Option<String>, value: Option<Value>| match (attribute, value) {
            (Some(attribute), Some(value)) => Ok(AttributeValueAssertion { attribute, value }),
            _ => Err(DecodeError::malformed("assertion closed before its value")),
        };
        Ok(match self.kind {
            LeafKind::Equality => Filter::Equality(ava(self.attribute, self.value)?),
            LeafKind::GreaterOrEqual => Filter::GreaterOrEqual(ava(self.attribute, self.value)?),
            LeafKind::LessOrEqual => Filter::LessOrEqual(ava(self.attribute, self.value)?),
            LeafKind::Approx => Filter::Approx(ava(self.attribute, self.value)?),
            LeafKind::Substrings => {
                let attribute = self
                    .attribute
                    .ok_or_else(|| DecodeError::malformed("substrings closed before its type"))?;
                let f = SubstringFilter {
                    attribute,
                    initial: self.initial,
                    any: self.any,
                    final_: self.final_,
                };
                if f.is_empty() {
                    return Err(DecodeError::EmptyRequiredField("substrings"));
                }
                Filter::Substrings(f)
            }
            LeafKind::Extensible => {
                let value = self
                    .value
                    .ok_or_else(|| DecodeError::malformed("extensible match closed before its value"))?;
                if self.matching_rule.is_none() && self.attribute.is_none() {
                    return Err(DecodeError::EmptyRequiredField("matching rule or type"));
                }
                Filter::Extensible(ExtensibleMatch {
                    matching_rule: self.matching_rule,
                    attribute: self.attribute,
                    value,
                    dn_attributes: self.dn_attributes,
                })
            }
        })
    }
}

#[derive(Debug)]
struct Frame {
    connector: Connector,
    children: Vec<Filter>,
    /// Index of the connector's SET in the decode stack.
    level: usize,
}

/// Assembles a filter from its tags in document order.
///
/// Open connectors sit on an explicit stack; each completed node is handed
/// to the innermost open connector, or becomes the root when none is open.
/// Connectors are closed by the decode stack when their declared length has
/// been consumed, which may close several of them on a single token.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    frames: Vec<Frame>,
    leaf: Option<PendingLeaf>,
    root: Option<Filter>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.leaf = None;
        self.root = None;
    }

    /// Decode stack index of the innermost open connector.
    pub fn parent_level(&self) -> Option<usize> {
        self.frames.last().map(|f| f.level)
    }

    fn check_can_start(&self) -> Result<(), DecodeError> {
        if self.leaf.is_some() {
            return Err(DecodeError::malformed("filter nested inside an assertion"));
        }
        if self.frames.is_empty() && self.root.is_some() {
            return Err(DecodeError::malformed("more than one top level filter"));
        }
        if let Some(frame) = self.frames.last() {
            if frame.connector == Connector::Not && !frame.children.is_empty() {
                return Err(DecodeError::malformed("not filter with more than one child"));
            }
        }
        Ok(())
    }

    pub fn open_connector(&mut self, connector: Connector, level: usize) -> Result<(), DecodeError> {
        self.check_can_start()?;
        self.frames.push(Frame {
            connector,
            children: Vec::new(),
            level,
        });
        Ok(())
    }

    pub fn open_leaf(&mut self, kind: LeafKind) -> Result<(), DecodeError> {
        self.check_can_start()?;
        self.leaf = Some(PendingLeaf::new(kind));
        Ok(())
    }

    pub fn add_present(&mut self, attribute: String) -> Result<(), DecodeError> {
        self.check_can_start()?;
        self.attach(Filter::Present(attribute))
    }

    pub fn leaf_mut(&mut self) -> Result<&mut PendingLeaf, DecodeError> {
        self.leaf
            .as_mut()
            .ok_or_else(|| DecodeError::malformed("assertion field outside of an assertion"))
    }

    pub fn close_leaf(&mut self) -> Result<(), DecodeError> {
        let leaf = self
            .leaf
            .take()
            .ok_or_else(|| DecodeError::malformed("no assertion to close"))?;
        let filter = leaf.into_filter()?;
        self.attach(filter)
    }

    pub fn close_connector(&mut self) -> Result<(), DecodeError> {
        if self.leaf.is_some() {
            return Err(DecodeError::malformed("connector closed inside an assertion"));
        }
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| DecodeError::malformed("no connector to close"))?;
        let filter = match frame.connector {
            Connector::And => Filter::And(frame.children),
            Connector::Or => Filter::Or(frame.children),
            Connector::Not => {
                let mut children = frame.children;
                match (children.pop(), children.is_empty()) {
                    (Some(inner), true) => Filter::Not(Box::new(inner)),
                    _ => return Err(DecodeError::malformed("not filter without exactly one child")),
                }
            }
        };
        self.attach(filter)
    }

    fn attach(&mut self, filter: Filter) -> Result<(), DecodeError> {
        match self.frames.last_mut() {
            Some(frame) => {
                if frame.connector == Connector::Not && !frame.children.is_empty() {
                    return Err(DecodeError::malformed("not filter with more than one child"));
                }
                frame.children.push(filter);
            }
            None => {
                if self.root.is_some() {
                    return Err(DecodeError::malformed("more than one top level filter"));
                }
                self.root = Some(filter);
            }
        }
        Ok(())
    }

    /// True once a whole filter has been read.
    pub fn is_complete(&self) -> bool {
        self.frames.is_empty() && self.leaf.is_none() && self.root.is_some()
    }

    pub fn finish(&mut self) -> Result<Filter, DecodeError> {
        if !self.frames.is_empty() || self.leaf.is_some() {
            return Err(DecodeError::malformed("filter is not complete"));
        }
        self.root
            .take()
            .ok_or(DecodeError::EmptyRequiredField("filter"))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn eq_leaf(b: &mut FilterBuilder, attr: &str, value: &str) {
        b.open_leaf(LeafKind::Equality).unwrap();
        let leaf = b.leaf_mut().unwrap();
        leaf.attribute = Some(attr.to_owned());
        leaf.value = Some(Value::from(value));
        b.close_leaf().unwrap();
    }

    #[test]
    fn nested_connectors() {
        // (&(|(cn=a)(cn=b))(!(sn=c)))
        let mut b = FilterBuilder::new();
        b.open_connector(Connector::And, 2).unwrap();
        b.open_connector(Connector::Or, 3).unwrap();
        assert_eq!(b.parent_level(), Some(3));
        eq_leaf(&mut b, "cn", "a");
        eq_leaf(&mut b, "cn", "b");
        b.close_connector().unwrap();
        b.open_connector(Connector::Not, 3).unwrap();
        eq_leaf(&mut b, "sn", "c");
        b.close_connector().unwrap();
        assert!(!b.is_complete());
        b.close_connector().unwrap();
        assert!(b.is_complete());
        assert_eq!(
            b.finish().unwrap(),
            Filter::And(vec![
                Filter::Or(vec![Filter::equality("cn", "a"), Filter::equality("cn", "b")]),
                Filter::not(Filter::equality("sn", "c")),
            ])
        );
    }

    #[test]
    fn empty_connector_is_kept() {
        let mut b = FilterBuilder::new();
        b.open_connector(Connector::Or, 2).unwrap();
        b.close_connector().unwrap();
        assert_eq!(b.finish().unwrap(), Filter::Or(vec![]));
    }

    #[test]
    fn not_needs_one_child() {
        let mut b = FilterBuilder::new();
        b.open_connector(Connector::Not, 2).unwrap();
        assert!(b.close_connector().is_err());

        let mut b = FilterBuilder::new();
        b.open_connector(Connector::Not, 2).unwrap();
        b.add_present("cn".to_owned()).unwrap();
        assert!(b.add_present("sn".to_owned()).is_err());
    }

    #[test]
    fn single_root() {
        let mut b = FilterBuilder::new();
        b.add_present("objectClass".to_owned()).unwrap();
        assert!(b.add_present("cn".to_owned()).is_err());
        assert_eq!(b.finish().unwrap(), Filter::present("objectClass"));
    }

    #[test]
    fn incomplete_leaves() {
        let mut b = FilterBuilder::new();
        b.open_leaf(LeafKind::Equality).unwrap();
        b.leaf_mut().unwrap().attribute = Some("cn".to_owned());
        assert!(matches!(b.close_leaf(), Err(DecodeError::MalformedLength(_))));

        let mut b = FilterBuilder::new();
        b.open_leaf(LeafKind::Substrings).unwrap();
        b.leaf_mut().unwrap().attribute = Some("cn".to_owned());
        assert!(matches!(b.close_leaf(), Err(DecodeError::EmptyRequiredField("substrings"))));

        let mut b = FilterBuilder::new();
        b.open_leaf(LeafKind::Extensible).unwrap();
        b.leaf_mut().unwrap().value = Some(Value::from("x"));
        assert!(matches!(b.close_leaf(), Err(DecodeError::EmptyRequiredField(_))));
    }
}
