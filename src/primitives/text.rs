//! Text and input leaves.

use crate::types::{ElementType, NodeDescription};

use super::element::element;

/// Prop holding a text element's content.
pub const CONTENT_PROP: &str = "content";

/// Prop holding an input element's current value.
pub const VALUE_PROP: &str = "value";

/// Create a text description.
pub fn text(content: impl Into<String>) -> NodeDescription {
    element(ElementType::Text).prop(CONTENT_PROP, content.into())
}

/// Create an input description with its current value.
pub fn input(value: impl Into<String>) -> NodeDescription {
    element(ElementType::Input).prop(VALUE_PROP, value.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropValue;

    #[test]
    fn test_text_content() {
        let description = text("Hello");
        assert_eq!(description.ty, ElementType::Text);
        assert_eq!(
            description.props.get(CONTENT_PROP),
            Some(&PropValue::Str("Hello".into()))
        );
        assert!(description.children.is_empty());
    }

    #[test]
    fn test_input_value() {
        let description = input("abc").key("search");
        assert_eq!(description.ty, ElementType::Input);
        assert_eq!(description.props[VALUE_PROP], PropValue::Str("abc".into()));
    }
}
