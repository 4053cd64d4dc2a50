use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// A single section holding one empty paragraph.
    pub fn empty() -> Self {
        Self {
            children: vec![Node::section(vec![Node::paragraph("")])],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn element(kind: ElementKind, children: Vec<Node>) -> Self {
        Node::Element(ElementNode::new(kind, children))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode::new(text))
    }

    pub fn section(children: Vec<Node>) -> Self {
        Self::element(ElementKind::Section, children)
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::element(ElementKind::Paragraph, vec![Node::text(text)])
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::element(ElementKind::Heading { level }, vec![Node::text(text)])
    }

    pub fn summary(children: Vec<Node>) -> Self {
        Self::element(ElementKind::Summary, children)
    }

    pub fn details(children: Vec<Node>) -> Self {
        Self::element(ElementKind::Details, children)
    }

    pub fn table_cell(data: CellData, children: Vec<Node>) -> Self {
        Self::element(ElementKind::TableCell(data), children)
    }

    pub fn symbol(glyph: impl Into<String>) -> Self {
        Self::element(
            ElementKind::Symbol(SymbolData {
                glyph: glyph.into(),
                ..SymbolData::default()
            }),
            vec![Node::text("")],
        )
    }

    pub fn math(inner: impl Into<String>) -> Self {
        Self::element(
            ElementKind::Math(MathData {
                inner: inner.into(),
                attributes: BTreeMap::new(),
            }),
            vec![Node::text("")],
        )
    }

    pub fn embed(resource: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self::element(
            ElementKind::Embed(EmbedData {
                resource: resource.into(),
                fields,
                attributes: BTreeMap::new(),
            }),
            vec![Node::text("")],
        )
    }

    pub fn link(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self::element(
            ElementKind::Link(LinkData {
                href: href.into(),
                target: None,
                rel: None,
            }),
            vec![Node::text(text)],
        )
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    /// The registry name of this node's type; text nodes are `"text"`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Element(el) => el.kind.type_name(),
            Node::Text(_) => TEXT_TYPE,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Node::Element(el) => el.id.as_deref(),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text of every text leaf below this node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text_content(&mut out);
        out
    }

    fn push_text_content(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&t.text),
            Node::Element(el) => {
                for child in &el.children {
                    child.push_text_content(out);
                }
            }
        }
    }
}

pub const TEXT_TYPE: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: ElementKind,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn new(kind: ElementKind, children: Vec<Node>) -> Self {
        Self {
            id: None,
            kind,
            children,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Element type plus its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Section,
    Paragraph,
    Heading { level: u8 },
    Blockquote,
    Details,
    Summary,
    List(ListData),
    ListItem,
    Table,
    TableCaption,
    TableHead,
    TableBody,
    TableRow,
    TableCell(CellData),
    Link(LinkData),
    Span { lang: String },
    Symbol(SymbolData),
    Math(MathData),
    Embed(EmbedData),
}

impl ElementKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Section => "section",
            ElementKind::Paragraph => "paragraph",
            ElementKind::Heading { .. } => "heading",
            ElementKind::Blockquote => "blockquote",
            ElementKind::Details => "details",
            ElementKind::Summary => "summary",
            ElementKind::List(_) => "list",
            ElementKind::ListItem => "list_item",
            ElementKind::Table => "table",
            ElementKind::TableCaption => "table_caption",
            ElementKind::TableHead => "table_head",
            ElementKind::TableBody => "table_body",
            ElementKind::TableRow => "table_row",
            ElementKind::TableCell(_) => "table_cell",
            ElementKind::Link(_) => "link",
            ElementKind::Span { .. } => "span",
            ElementKind::Symbol(_) => "symbol",
            ElementKind::Math(_) => "math",
            ElementKind::Embed(_) => "embed",
        }
    }

    pub fn cell(&self) -> Option<&CellData> {
        match self {
            ElementKind::TableCell(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub ordered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellScope {
    Row,
    Col,
}

impl CellScope {
    pub fn as_str(self) -> &'static str {
        match self {
            CellScope::Row => "row",
            CellScope::Col => "col",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "row" | "rowgroup" => Some(CellScope::Row),
            "col" | "colgroup" => Some(CellScope::Col),
            _ => None,
        }
    }
}

fn one() -> u32 {
    1
}

fn is_one(value: &u32) -> bool {
    *value == 1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellData {
    /// `<th>` rather than `<td>`.
    #[serde(default)]
    pub header: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<CellScope>,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub colspan: u32,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub rowspan: u32,
    /// Wire-level `id` of a header cell. Unrelated to the element's node id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
}

impl Default for CellData {
    fn default() -> Self {
        Self {
            header: false,
            scope: None,
            colspan: 1,
            rowspan: 1,
            header_id: None,
            headers: None,
            align: None,
        }
    }
}

impl CellData {
    pub fn header() -> Self {
        Self {
            header: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkData {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolData {
    pub glyph: String,
    /// Extra `data-*` fields, keyed without the prefix.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    /// Any other attribute, kept verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathData {
    /// Verbatim inner markup of the `<math>` element.
    pub inner: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedData {
    /// The `data-resource` discriminator (`image`, `audio`, `video`, ...).
    pub resource: String,
    /// `data-*` fields, keyed without the prefix.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Any other attribute, kept verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl EmbedData {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn with_marks(mut self, marks: Marks) -> Self {
        self.marks = marks;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub sub: bool,
    #[serde(default)]
    pub sup: bool,
}

impl Marks {
    pub fn is_empty(&self) -> bool {
        *self == Marks::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
    Sub,
    Sup,
}

impl Marks {
    pub fn set(&mut self, mark: Mark, on: bool) {
        match mark {
            Mark::Bold => self.bold = on,
            Mark::Italic => self.italic = on,
            Mark::Underline => self.underline = on,
            Mark::Code => self.code = on,
            Mark::Sub => self.sub = on,
            Mark::Sup => self.sup = on,
        }
    }

    pub fn has(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Underline => self.underline,
            Mark::Code => self.code,
            Mark::Sub => self.sub,
            Mark::Sup => self.sup,
        }
    }
}
