//! A small MapCSS dialect for styling rendered OSM data.
//!
//! Supported:
//!
//! ```text
//! /* comment */
//! canvas { background-color: #f2efe9; }
//! way[highway=primary], way[highway=trunk] { color: #e892a2; width: 4; z-index: 2; }
//! area[landuse=grass] { fill-color: green; fill-opacity: 0.6; }
//! node[amenity] { symbol-size: 6; symbol-fill-color: #734a08; }
//! way:closed[building][building!=no] { fill-color: #d9d0c9; }
//! ```
//!
//! `way` matches every way, `area` and `:closed` only closed ones, `*` any
//! element. Rules cascade in file order; later declarations win. Properties
//! outside the supported set are ignored.

use thiserror::Error;
use tracing::debug;

use crate::osm::Tags;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stylesheet error on line {line}: {message}")]
pub struct StyleError {
    pub line: usize,
    pub message: String,
}

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rgb`, `#rrggbb` or a basic color name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }
        let color = match value.to_ascii_lowercase().as_str() {
            "black" => Color::rgb(0, 0, 0),
            "white" => Color::rgb(255, 255, 255),
            "red" => Color::rgb(255, 0, 0),
            "green" => Color::rgb(0, 128, 0),
            "blue" => Color::rgb(0, 0, 255),
            "yellow" => Color::rgb(255, 255, 0),
            "orange" => Color::rgb(255, 165, 0),
            "brown" => Color::rgb(165, 42, 42),
            "purple" => Color::rgb(128, 0, 128),
            "pink" => Color::rgb(255, 192, 203),
            "cyan" => Color::rgb(0, 255, 255),
            "magenta" => Color::rgb(255, 0, 255),
            "gray" | "grey" => Color::rgb(128, 128, 128),
            "lightgray" | "lightgrey" => Color::rgb(211, 211, 211),
            "darkgray" | "darkgrey" => Color::rgb(169, 169, 169),
            "darkgreen" => Color::rgb(0, 100, 0),
            "lightblue" => Color::rgb(173, 216, 230),
            "beige" => Color::rgb(245, 245, 220),
            _ => return None,
        };
        Some(color)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(
            channel(&hex[0..1])? * 17,
            channel(&hex[1..2])? * 17,
            channel(&hex[2..3])? * 17,
        )),
        6 => Some(Color::rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        _ => None,
    }
}

/// What a selector can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    /// An open way.
    Way,
    /// A closed way.
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectorType {
    Any,
    Node,
    Way,
    Area,
    Canvas,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Has(String),
    Equals(String, String),
    NotEquals(String, String),
    Closed,
}

impl Condition {
    fn matches(&self, kind: ElementKind, tags: &Tags) -> bool {
        match self {
            Condition::Has(key) => tags.contains_key(key),
            Condition::Equals(key, value) => tags.get(key) == Some(value),
            Condition::NotEquals(key, value) => tags.get(key) != Some(value),
            Condition::Closed => kind == ElementKind::Area,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selector {
    target: SelectorType,
    conditions: Vec<Condition>,
}

impl Selector {
    fn matches(&self, kind: ElementKind, tags: &Tags) -> bool {
        let type_matches = match self.target {
            SelectorType::Any => true,
            SelectorType::Node => kind == ElementKind::Node,
            SelectorType::Way => kind != ElementKind::Node,
            SelectorType::Area => kind == ElementKind::Area,
            SelectorType::Canvas => false,
        };
        type_matches && self.conditions.iter().all(|c| c.matches(kind, tags))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Property {
    Color(Color),
    Width(f32),
    Opacity(f32),
    FillColor(Color),
    FillOpacity(f32),
    BackgroundColor(Color),
    ZIndex(f32),
    SymbolSize(f32),
    SymbolFillColor(Color),
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    selectors: Vec<Selector>,
    properties: Vec<Property>,
}

/// Resolved style of one element. `None` means "not drawn" for that part.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Style {
    pub color: Option<Color>,
    pub width: Option<f32>,
    pub opacity: Option<f32>,
    pub fill_color: Option<Color>,
    pub fill_opacity: Option<f32>,
    pub z_index: f32,
    pub symbol_size: Option<f32>,
    pub symbol_fill_color: Option<Color>,
}

impl Style {
    fn apply(&mut self, property: Property) {
        match property {
            Property::Color(c) => self.color = Some(c),
            Property::Width(w) => self.width = Some(w),
            Property::Opacity(o) => self.opacity = Some(o),
            Property::FillColor(c) => self.fill_color = Some(c),
            Property::FillOpacity(o) => self.fill_opacity = Some(o),
            Property::ZIndex(z) => self.z_index = z,
            Property::SymbolSize(s) => self.symbol_size = Some(s),
            Property::SymbolFillColor(c) => self.symbol_fill_color = Some(c),
            Property::BackgroundColor(_) => {}
        }
    }

    /// True if nothing would be drawn.
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.fill_color.is_none() && self.symbol_size.is_none()
    }
}

/// A parsed stylesheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleSheet {
    rules: Vec<Rule>,
}

impl StyleSheet {
    pub fn parse(source: &str) -> Result<Self, StyleError> {
        let mut parser = Parser::new(source);
        let mut rules = Vec::new();
        loop {
            parser.skip_whitespace_and_comments()?;
            if parser.at_end() {
                break;
            }
            rules.push(parser.rule()?);
        }
        debug!(rules = rules.len(), "Parsed stylesheet");
        Ok(Self { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Cascaded style for an element with `tags`.
    pub fn style_for(&self, kind: ElementKind, tags: &Tags) -> Style {
        let mut style = Style::default();
        for rule in &self.rules {
            if rule.selectors.iter().any(|s| s.matches(kind, tags)) {
                for property in &rule.properties {
                    style.apply(*property);
                }
            }
        }
        style
    }

    /// `background-color` of the last `canvas` rule that sets one.
    pub fn canvas_background(&self) -> Option<Color> {
        self.rules
            .iter()
            .filter(|r| r.selectors.iter().any(|s| s.target == SelectorType::Canvas))
            .flat_map(|r| r.properties.iter())
            .filter_map(|p| match p {
                Property::BackgroundColor(c) => Some(*c),
                _ => None,
            })
            .last()
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> StyleError {
        StyleError {
            line: self.line,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), StyleError> {
        self.skip_whitespace_and_comments()?;
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of file", expected))),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), StyleError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'*') => {
                    let start = self.line;
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.pos += 1;
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(StyleError {
                                    line: start,
                                    message: "unterminated comment".to_string(),
                                })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn identifier(&mut self) -> String {
        if self.peek() == Some('*') {
            self.bump();
            return "*".to_string();
        }
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '-' || c == '_') {
                break;
            }
            ident.push(c);
            self.bump();
        }
        ident
    }

    fn rule(&mut self) -> Result<Rule, StyleError> {
        let mut selectors = vec![self.selector()?];
        loop {
            self.skip_whitespace_and_comments()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                    selectors.push(self.selector()?);
                }
                Some('{') => break,
                Some(c) => return Err(self.error(format!("unexpected '{}' in selector", c))),
                None => return Err(self.error("expected '{' after selector")),
            }
        }
        self.expect('{')?;
        let properties = self.declarations()?;
        Ok(Rule {
            selectors,
            properties,
        })
    }

    fn selector(&mut self) -> Result<Selector, StyleError> {
        self.skip_whitespace_and_comments()?;
        let name = self.identifier();
        let target = match name.as_str() {
            "*" => SelectorType::Any,
            "node" => SelectorType::Node,
            "way" => SelectorType::Way,
            "area" => SelectorType::Area,
            "canvas" => SelectorType::Canvas,
            "" => return Err(self.error("expected a selector")),
            other => return Err(self.error(format!("unknown selector type '{}'", other))),
        };

        let mut conditions = Vec::new();
        loop {
            match self.peek() {
                Some('[') => {
                    self.bump();
                    conditions.push(self.condition()?);
                }
                Some(':') => {
                    self.bump();
                    let class = self.identifier();
                    match class.as_str() {
                        "closed" => conditions.push(Condition::Closed),
                        other => return Err(self.error(format!("unsupported pseudo-class ':{}'", other))),
                    }
                }
                _ => break,
            }
        }
        Ok(Selector { target, conditions })
    }

    fn condition(&mut self) -> Result<Condition, StyleError> {
        self.skip_whitespace_and_comments()?;
        let key = self.value_token()?;
        self.skip_whitespace_and_comments()?;
        let condition = match self.peek() {
            Some(']') => Condition::Has(key),
            Some('=') => {
                self.bump();
                Condition::Equals(key, self.value_token()?)
            }
            Some('!') => {
                self.bump();
                if self.bump() != Some('=') {
                    return Err(self.error("expected '!='"));
                }
                Condition::NotEquals(key, self.value_token()?)
            }
            Some(c) => return Err(self.error(format!("unexpected '{}' in condition", c))),
            None => return Err(self.error("unterminated condition")),
        };
        self.expect(']')?;
        Ok(condition)
    }

    /// A bare word or a quoted string.
    fn value_token(&mut self) -> Result<String, StyleError> {
        self.skip_whitespace_and_comments()?;
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => return Ok(value),
                        Some(c) => value.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
            }
            _ => {
                let mut value = String::new();
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || matches!(c, ']' | '=' | '!') {
                        break;
                    }
                    value.push(c);
                    self.bump();
                }
                if value.is_empty() {
                    return Err(self.error("expected a tag key or value"));
                }
                Ok(value)
            }
        }
    }

    fn declarations(&mut self) -> Result<Vec<Property>, StyleError> {
        let mut properties = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(properties);
                }
                Some(';') => {
                    self.bump();
                }
                Some(_) => {
                    let name = self.identifier();
                    if name.is_empty() {
                        return Err(self.error("expected a property name"));
                    }
                    self.expect(':')?;
                    let line = self.line;
                    let value = self.declaration_value();
                    if let Some(property) = parse_property(&name, &value, line)? {
                        properties.push(property);
                    }
                }
                None => return Err(self.error("expected '}' before end of file")),
            }
        }
    }

    fn declaration_value(&mut self) -> String {
        let mut value = String::new();
        while let Some(c) = self.peek() {
            if c == ';' || c == '}' {
                break;
            }
            value.push(c);
            self.bump();
        }
        value.trim().to_string()
    }
}

fn parse_property(name: &str, value: &str, line: usize) -> Result<Option<Property>, StyleError> {
    let invalid = |what: &str| StyleError {
        line,
        message: format!("invalid {} '{}' for '{}'", what, value, name),
    };
    let color = || Color::parse(value).ok_or_else(|| invalid("color"));
    let number = || {
        value
            .trim_end_matches("px")
            .parse::<f32>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| invalid("number"))
    };
    let fraction = || number().map(|n| n.clamp(0.0, 1.0));

    let property = match name {
        "color" => Property::Color(color()?),
        "width" => Property::Width(number()?),
        "opacity" => Property::Opacity(fraction()?),
        "fill-color" => Property::FillColor(color()?),
        "fill-opacity" => Property::FillOpacity(fraction()?),
        "background-color" => Property::BackgroundColor(color()?),
        "z-index" => Property::ZIndex(number()?),
        "symbol-size" => Property::SymbolSize(number()?),
        "symbol-fill-color" => Property::SymbolFillColor(color()?),
        other => {
            debug!(property = other, line, "Ignoring unsupported MapCSS property");
            return Ok(None);
        }
    };
    Ok(Some(property))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const SHEET: &str = r#"
/* base map */
canvas { background-color: #f2efe9; }

way[highway=primary], way[highway=trunk] {
    color: #e892a2;
    width: 4;
    z-index: 2;
}

area[landuse=grass] { fill-color: green; fill-opacity: 0.6; }
way:closed[building][building!=no] { fill-color: #d9d0c9; color: #c4b6ab; width: 1; }
node[amenity] { symbol-size: 6; symbol-fill-color: #734a08; text: name; }
way[highway=trunk] { width: 6; }
"#;

    #[test]
    fn test_color_parsing() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#0a0B0c"), Some(Color::rgb(10, 11, 12)));
        assert_eq!(Color::parse("Grey"), Some(Color::rgb(128, 128, 128)));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("#ggg"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn test_parse_counts_rules() {
        let sheet = StyleSheet::parse(SHEET).unwrap();
        assert_eq!(sheet.rule_count(), 6);
        assert_eq!(sheet.canvas_background(), Color::parse("#f2efe9"));
    }

    #[test]
    fn test_way_styles_cascade() {
        let sheet = StyleSheet::parse(SHEET).unwrap();

        let primary = sheet.style_for(ElementKind::Way, &tags(&[("highway", "primary")]));
        assert_eq!(primary.width, Some(4.0));
        assert_eq!(primary.z_index, 2.0);

        let trunk = sheet.style_for(ElementKind::Way, &tags(&[("highway", "trunk")]));
        assert_eq!(trunk.width, Some(6.0));
        assert_eq!(trunk.color, Color::parse("#e892a2"));

        let path = sheet.style_for(ElementKind::Way, &tags(&[("highway", "path")]));
        assert!(path.is_empty());
    }

    #[test]
    fn test_area_selectors_need_closed_ways() {
        let sheet = StyleSheet::parse(SHEET).unwrap();
        let grass = tags(&[("landuse", "grass")]);

        assert_eq!(
            sheet.style_for(ElementKind::Area, &grass).fill_color,
            Some(Color::rgb(0, 128, 0))
        );
        assert_eq!(sheet.style_for(ElementKind::Way, &grass).fill_color, None);

        let building = tags(&[("building", "yes")]);
        assert!(sheet.style_for(ElementKind::Area, &building).fill_color.is_some());
        let not_building = tags(&[("building", "no")]);
        assert!(sheet.style_for(ElementKind::Area, &not_building).is_empty());
    }

    #[test]
    fn test_node_style_ignores_unknown_properties() {
        let sheet = StyleSheet::parse(SHEET).unwrap();
        let style = sheet.style_for(ElementKind::Node, &tags(&[("amenity", "fuel")]));
        assert_eq!(style.symbol_size, Some(6.0));
        assert_eq!(style.symbol_fill_color, Color::parse("#734a08"));
        assert!(sheet.style_for(ElementKind::Node, &Tags::new()).is_empty());
    }

    #[test]
    fn test_wildcard_and_quoted_values() {
        let sheet = StyleSheet::parse(r#"*[name="Main Street"] { color: red; }"#).unwrap();
        let style = sheet.style_for(ElementKind::Node, &tags(&[("name", "Main Street")]));
        assert_eq!(style.color, Some(Color::rgb(255, 0, 0)));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = StyleSheet::parse("way { width: 1; }\n\nway { color: notacolor; }").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("notacolor"));

        let err = StyleSheet::parse("road { color: red; }").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("road"));

        let err = StyleSheet::parse("way { color: red;\n").unwrap_err();
        assert!(err.message.contains("end of file"));

        let err = StyleSheet::parse("/* open\n\n").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
