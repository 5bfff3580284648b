pub mod baseline;
pub mod demo;
pub mod embed;

/// Test queries grouped by topic, to exercise similarity grouping.
pub const DEMO_QUERIES: &[&str] = &[
    // Machine learning basics
    "What is machine learning?",
    "Explain machine learning algorithms",
    "How does machine learning work?",
    // Deep learning
    "What is deep learning?",
    "Explain neural networks",
    "How do neural networks learn?",
    // Natural language processing
    "What is natural language processing?",
    "How does NLP work?",
    "Explain text processing",
    // Computer vision
    "What is computer vision?",
    "How does image recognition work?",
    "Explain object detection",
    // Unrelated: cooking
    "How do I bake a cake?",
    "What is the best chocolate recipe?",
    // Unrelated: sports
    "Who won the world cup?",
    "Explain basketball rules",
];

/// A horizontal rule for report blocks.
pub fn rule() -> String {
    "=".repeat(60)
}
