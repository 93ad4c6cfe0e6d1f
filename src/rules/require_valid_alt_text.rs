//! `require-valid-alt-text`: non-text content needs a text alternative
//!
//! Applies to `<img>`, `<input type="image">`, `<object>` and `<area>`.
//! Elements hidden with `hidden` or `aria-hidden="true"` are exempt.

use crate::diagnostic::Severity;
use crate::inspect::{
    attribute_value, has_any_attribute, has_attribute, has_attribute_value, has_children,
    is_area_element, is_img_element, is_input_element, is_object_element, AttrLookup,
};
use crate::node::{NodeKind, NodeRef};
use crate::rule::{Rule, RuleCategory, RuleContext, RuleMeta, Visitor};

pub const IMG_MISSING_ALT: &str = "img tags must have an alt attribute";

pub const IMG_EMPTY_ALT_NEEDS_ROLE: &str = "if the `alt` attribute is present and the value is an empty string, `role=\"presentation\"` or `role=\"none\"` must be present";

pub const INPUT_IMAGE_MISSING_ALT: &str = "<input> elements with type=\"image\" must have a text alternative through the `alt`, `aria-label`, or `aria-labelledby` attribute.";

pub const OBJECT_MISSING_ALT: &str = "Embedded <object> elements must have alternative text by providing inner text, aria-label or aria-labelledby attributes.";

pub const AREA_MISSING_ALT: &str = "Each area of an image map must have a text alternative through the `alt`, `aria-label`, or `aria-labelledby` attribute.";

static META: RuleMeta = RuleMeta {
    id: "require-valid-alt-text",
    description: "Require text alternatives for images, image inputs, objects and image-map areas",
    category: RuleCategory::Accessibility,
    recommended: true,
    default_severity: Severity::Error,
};

/// Text-alternative policy for non-text content
#[derive(Debug, Default, Clone, Copy)]
pub struct RequireValidAltText;

impl RequireValidAltText {
    pub fn new() -> Self {
        Self
    }

    fn check_element(&self, node: NodeRef<'_>, ctx: &mut RuleContext<'_>) {
        if has_attribute(node, "hidden") || has_attribute_value(node, "aria-hidden", "true") {
            return;
        }

        if is_img_element(node) {
            self.check_img(node, ctx);
        } else if is_input_element(node) {
            if !has_attribute_value(node, "type", "image") {
                return;
            }
            if !has_any_attribute(node, &["aria-label", "aria-labelledby", "alt"]) {
                ctx.report(node, INPUT_IMAGE_MISSING_ALT);
            }
        } else if is_object_element(node) {
            if has_any_attribute(node, &["aria-label", "aria-labelledby", "title"])
                || has_children(node)
            {
                return;
            }
            ctx.report(node, OBJECT_MISSING_ALT);
        } else if is_area_element(node)
            && !has_any_attribute(node, &["aria-label", "aria-labelledby", "alt"])
        {
            ctx.report(node, AREA_MISSING_ALT);
        }
    }

    fn check_img(&self, node: NodeRef<'_>, ctx: &mut RuleContext<'_>) {
        match attribute_value(node, "alt") {
            AttrLookup::Missing => ctx.report(node, IMG_MISSING_ALT),
            AttrLookup::Literal("") => {
                let role = attribute_value(node, "role").as_literal();
                if !matches!(role, Some("presentation" | "none")) {
                    ctx.report(node, IMG_EMPTY_ALT_NEEDS_ROLE);
                }
            }
            AttrLookup::Literal(_) | AttrLookup::Dynamic => {}
        }
    }
}

impl Rule for RequireValidAltText {
    fn meta(&self) -> &RuleMeta {
        &META
    }

    fn visitor(&self) -> Visitor<'_> {
        Visitor::new().on(NodeKind::Element, move |node, ctx| self.check_element(node, ctx))
    }
}
