//! Built-in component tables
//!
//! Immutable lookup tables describing the runtime's built-in elements. They
//! are built once per process and handed to the transform by reference.

use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ComponentTables {
    /// Every built-in element name.
    builtins: HashSet<&'static str>,
    /// Elements that never get a matching `pop()`.
    leaves: HashSet<&'static str>,
    /// Attributes whose `$$` binding uses the `{ value, changeEvent }` object form.
    object_binding_attrs: HashSet<&'static str>,
    /// Attributes taking builder references.
    builder_attrs: HashSet<&'static str>,
    /// Elements whose children are passed as a content closure to `create`.
    content_closure: HashSet<&'static str>,
    /// Global functions that animate and are rerouted through `Context`.
    context_calls: HashSet<&'static str>,
}

const BUILTIN_ELEMENTS: &[&str] = &[
    "AbilityComponent", "AlphabetIndexer", "Badge", "Blank", "Button", "Calendar",
    "CalendarPicker", "Canvas", "Checkbox", "CheckboxGroup", "Circle", "ColorPicker",
    "Column", "ColumnSplit", "ContainerSpan", "Counter", "DataPanel", "DatePicker",
    "Divider", "EffectComponent", "Ellipse", "EmbeddedComponent", "Flex", "FlowItem",
    "FolderStack", "FormComponent", "FormLink", "Gauge", "Grid", "GridCol", "GridContainer",
    "GridItem", "GridRow", "Hyperlink", "Image", "ImageAnimator", "ImageSpan", "Line", "List",
    "ListItem", "ListItemGroup", "LoadingProgress", "Marquee", "Menu", "MenuItem",
    "MenuItemGroup", "NavDestination", "NavRouter", "Navigation", "Navigator", "NodeContainer",
    "Panel", "Path", "PatternLock", "PluginComponent", "Polygon", "Polyline", "Progress",
    "QRCode", "Radio", "Rating", "Rect", "Refresh", "RelativeContainer", "RemoteWindow",
    "RichEditor", "RichText", "Row", "RowSplit", "Scroll", "ScrollBar", "Search", "Select",
    "Shape", "SideBarContainer", "Slider", "Span", "Stack", "Stepper", "StepperItem", "Swiper",
    "SymbolGlyph", "TabContent", "Tabs", "Text", "TextArea", "TextClock", "TextInput",
    "TextPicker", "TextTimer", "TimePicker", "Toggle", "UIExtensionComponent", "Video",
    "WaterFlow", "Web", "WindowScene", "XComponent",
];

const LEAF_ELEMENTS: &[&str] = &[
    "AlphabetIndexer", "Circle", "DatePicker", "Divider", "Ellipse", "Image", "ImageAnimator",
    "ImageSpan", "Line", "LoadingProgress", "Marquee", "Path", "PatternLock", "Polygon",
    "Polyline", "Progress", "QRCode", "Rect", "RichText", "ScrollBar", "Slider", "SymbolGlyph",
    "TextArea", "TextClock", "TextInput", "TimePicker", "Video", "Web", "XComponent",
];

const OBJECT_BINDING_ATTRS: &[&str] = &[
    "bindPopup", "bindSheet", "bindContentCover", "bindMenu", "bindContextMenu",
];

const BUILDER_ATTRS: &[&str] = &[
    "bindPopup", "bindMenu", "bindContextMenu", "bindSheet", "bindContentCover", "title",
    "menus", "toolBar", "tabBar", "background", "dragPreview", "navDestination",
];

const CONTENT_CLOSURE_ELEMENTS: &[&str] = &["TabContent", "NavDestination"];

const CONTEXT_CALLS: &[&str] = &["animateTo", "animateToImmediately"];

impl ComponentTables {
    /// The tables for the stock runtime.
    pub fn standard() -> Self {
        Self {
            builtins: BUILTIN_ELEMENTS.iter().copied().collect(),
            leaves: LEAF_ELEMENTS.iter().copied().collect(),
            object_binding_attrs: OBJECT_BINDING_ATTRS.iter().copied().collect(),
            builder_attrs: BUILDER_ATTRS.iter().copied().collect(),
            content_closure: CONTENT_CLOSURE_ELEMENTS.iter().copied().collect(),
            context_calls: CONTEXT_CALLS.iter().copied().collect(),
        }
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    pub fn is_leaf(&self, name: &str) -> bool {
        self.leaves.contains(name)
    }

    pub fn uses_object_binding(&self, attr: &str) -> bool {
        self.object_binding_attrs.contains(attr)
    }

    pub fn takes_builder(&self, attr: &str) -> bool {
        self.builder_attrs.contains(attr)
    }

    pub fn has_content_closure(&self, name: &str) -> bool {
        self.content_closure.contains(name)
    }

    pub fn is_context_call(&self, name: &str) -> bool {
        self.context_calls.contains(name)
    }
}

impl Default for ComponentTables {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tables() {
        let tables = ComponentTables::standard();
        assert!(tables.is_builtin("Column"));
        assert!(tables.is_builtin("Divider"));
        assert!(!tables.is_builtin("MyCard"));
        assert!(tables.is_leaf("Divider"));
        assert!(!tables.is_leaf("Text"));
        assert!(tables.uses_object_binding("bindSheet"));
        assert!(tables.takes_builder("bindMenu"));
        assert!(tables.has_content_closure("TabContent"));
        assert!(tables.is_context_call("animateTo"));
    }

    #[test]
    fn test_leaves_are_builtins() {
        let tables = ComponentTables::standard();
        for leaf in LEAF_ELEMENTS {
            assert!(tables.is_builtin(leaf), "{} missing from builtins", leaf);
        }
    }
}
