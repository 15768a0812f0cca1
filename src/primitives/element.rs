//! Element builders.

use crate::types::{ElementType, NodeDescription, PropValue};

/// Create a description of the given element type with no props or children.
pub fn element(ty: ElementType) -> NodeDescription {
    NodeDescription {
        ty,
        ..Default::default()
    }
}

/// Create a container description.
pub fn box_element() -> NodeDescription {
    element(ElementType::Box)
}

impl NodeDescription {
    /// Give this description an explicit sibling key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set one prop, replacing an earlier value under the same name.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Append one child.
    pub fn child(mut self, child: NodeDescription) -> Self {
        self.children.push(child);
        self
    }

    /// Append children in order.
    pub fn children(mut self, children: impl IntoIterator<Item = NodeDescription>) -> Self {
        self.children.extend(children);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rgba;

    #[test]
    fn test_builder_chain() {
        let description = box_element()
            .key("root")
            .prop("width", 40)
            .prop("fg", Rgba::RED)
            .child(element(ElementType::Progress))
            .children([element(ElementType::Canvas), element(ElementType::Select)]);

        assert_eq!(description.ty, ElementType::Box);
        assert_eq!(description.key.as_deref(), Some("root"));
        assert_eq!(description.props.get("width"), Some(&PropValue::Int(40)));
        assert_eq!(description.props.get("fg"), Some(&PropValue::Color(Rgba::RED)));
        assert_eq!(description.children.len(), 3);
    }

    #[test]
    fn test_prop_replaces_in_place() {
        let description = box_element().prop("a", 1).prop("b", 2).prop("a", 3);
        let names: Vec<&str> = description.props.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(description.props["a"], PropValue::Int(3));
    }
}
