/// Vertex layout description passed to the graphics device

/// Component type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Uint8,
    Int16,
    Float,
}

impl AttributeType {
    /// Size of one component in bytes
    pub fn size(self) -> u16 {
        match self {
            AttributeType::Uint8 => 1,
            AttributeType::Int16 => 2,
            AttributeType::Float => 4,
        }
    }
}

/// One attribute inside a vertex layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader attribute location
    pub location: u32,
    /// Number of components (1..=4)
    pub components: u8,
    /// Component type
    pub attribute_type: AttributeType,
    /// Whether integer data is normalized to [0, 1] / [-1, 1]
    pub normalized: bool,
    /// Byte offset inside one vertex
    pub offset: u16,
}

/// Vertex stream layout: stride plus attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u16,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Create an empty layout with the given stride
    pub fn new(stride: u16) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    /// Append an attribute (builder style)
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}
