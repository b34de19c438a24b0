//! Mermaid flowchart generation from source code.
//!
//! Builds an analysis-aware prompt, sends it through [`AiService`], and
//! extracts the Mermaid block from the model's answer. Local models get a
//! more prescriptive prompt variant and pre-filtered input — they drown in
//! large files that cloud models handle fine.

use crate::error::ProviderError;
use crate::service::AiService;
use regex::Regex;
use std::sync::LazyLock;

static MERMAID_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```mermaid\s*(.*?)\s*```").expect("static regex")
});

static JAVA_HINTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"public\s+class|import\s+java").expect("static regex"));
static JS_HINTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"function\s+|const\s+|let\s+|var\s+").expect("static regex"));
static PYTHON_HINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"def\s+|import\s+\w+|from\s+\w+\s+import").expect("static regex")
});
static CSHARP_HINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"using\s+|namespace\s+|public\s+static\s+void\s+Main").expect("static regex")
});

static AUTO_GENERATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)auto generated|openapi-generator|do not edit").expect("static regex")
});
static MODEL_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)AbstractOpenApiSchema|@JsonProperty|@JsonDeserialize").expect("static regex")
});
static SERVICE_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@Service|@Component|@Repository").expect("static regex"));
static CONTROLLER_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@Controller|@RestController").expect("static regex"));
static METHOD_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"public\s+(?:\w+\s+)*(\w+)\s*\([^)]*\)\s*\{").expect("static regex")
});
static BRANCHING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"if\s*\(|for\s*\(|while\s*\(|switch\s*\(").expect("static regex"));

static LOCAL_MODEL_HINTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^ollama:",
        r"(?i)codellama",
        r"(?i)llama.*[1-9]b",
        r"(?i)mistral.*[1-9]b",
        r"(?i)starcoder.*[1-9]b",
        r"(?i)qwen.*[1-9]b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

const FLOWCHART_KEYWORDS: &[&str] = &[
    "flowchart",
    "flow chart",
    "mermaid",
    "diagram",
    "graph",
    "workflow",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Model,
    Service,
    Controller,
    Unknown,
}

impl ClassKind {
    fn as_str(self) -> &'static str {
        match self {
            ClassKind::Model => "model",
            ClassKind::Service => "service",
            ClassKind::Controller => "controller",
            ClassKind::Unknown => "unknown",
        }
    }
}

/// Shape summary of the input used to steer the prompt.
#[derive(Debug)]
pub struct CodeAnalysis {
    pub is_large_file: bool,
    pub is_auto_generated: bool,
    pub has_business_logic: bool,
    pub main_methods: Vec<String>,
    pub class_kind: ClassKind,
    pub line_count: usize,
    pub char_count: usize,
}

pub struct FlowchartGenerator<'a> {
    service: &'a AiService,
}

impl<'a> FlowchartGenerator<'a> {
    pub fn new(service: &'a AiService) -> Self {
        Self { service }
    }

    /// Generate a Mermaid flowchart for `code` with the given model.
    pub async fn generate(&self, code: &str, model: &str) -> Result<String, ProviderError> {
        let language = detect_language(code);
        let prompt = build_prompt(code, language, model);

        tracing::debug!(model, prompt_len = prompt.len(), "requesting flowchart");
        let response = self.service.generate(model, &prompt).await?;

        Ok(extract_mermaid(&response))
    }
}

/// Whether a chat message is asking for a flowchart at all.
pub fn is_flowchart_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    FLOWCHART_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub fn detect_language(code: &str) -> &'static str {
    if JAVA_HINTS.is_match(code) {
        "java"
    } else if JS_HINTS.is_match(code) {
        "javascript"
    } else if PYTHON_HINTS.is_match(code) {
        "python"
    } else if CSHARP_HINTS.is_match(code) {
        "csharp"
    } else {
        "unknown"
    }
}

pub fn is_likely_local_model(model: &str) -> bool {
    LOCAL_MODEL_HINTS.iter().any(|p| p.is_match(model))
}

pub fn analyze(code: &str) -> CodeAnalysis {
    let line_count = code.lines().count();
    let char_count = code.len();

    let main_methods: Vec<String> = METHOD_DECL
        .captures_iter(code)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|name| {
            !name.starts_with("get")
                && !name.starts_with("set")
                && !name.starts_with("is")
                && !matches!(name.as_str(), "equals" | "hashCode" | "toString" | "clone")
        })
        .take(10)
        .collect();

    let class_kind = if MODEL_CLASS.is_match(code) {
        ClassKind::Model
    } else if SERVICE_CLASS.is_match(code) {
        ClassKind::Service
    } else if CONTROLLER_CLASS.is_match(code) {
        ClassKind::Controller
    } else {
        ClassKind::Unknown
    };

    CodeAnalysis {
        is_large_file: line_count > 500 || char_count > 25_000,
        is_auto_generated: AUTO_GENERATED.is_match(code),
        has_business_logic: !main_methods.is_empty() || BRANCHING.is_match(code),
        main_methods,
        class_kind,
        line_count,
        char_count,
    }
}

/// Drop lines that never matter for a flowchart: imports, comments, blanks.
pub fn filter_large_code(code: &str) -> String {
    code.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("import ")
                && !trimmed.starts_with("//")
                && !trimmed.starts_with("/*")
                && !trimmed.starts_with('*')
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(code: &str, language: &str, model: &str) -> String {
    let analysis = analyze(code);

    let processed = if analysis.is_large_file {
        filter_large_code(code)
    } else {
        code.to_string()
    };

    if is_likely_local_model(model) {
        local_prompt(&processed, language, &analysis)
    } else {
        standard_prompt(&processed, language, &analysis)
    }
}

fn context_info(analysis: &CodeAnalysis) -> String {
    let mut info = String::from("# CODE ANALYSIS CONTEXT:\n");
    info.push_str(&format!(
        "- File size: {} lines ({}KB)\n- Type: {} class\n",
        analysis.line_count,
        analysis.char_count / 1024,
        analysis.class_kind.as_str()
    ));

    if analysis.is_auto_generated {
        info.push_str("- This is AUTO-GENERATED code (likely API model/DTO)\n");
        info.push_str("- Focus on class structure and main data flow, not implementation details\n");
    }

    if analysis.main_methods.is_empty() {
        info.push_str("- Mainly contains getters/setters and constructors\n");
    } else {
        let keys = analysis
            .main_methods
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        info.push_str(&format!("- Key methods: {keys}\n"));
    }

    if !analysis.has_business_logic {
        info.push_str("- Limited business logic detected - focus on data structure and initialization\n");
    }

    info
}

fn standard_prompt(code: &str, language: &str, analysis: &CodeAnalysis) -> String {
    format!(
        "You are an expert code analyzer. Create a COMPREHENSIVE and DETAILED Mermaid flowchart for the following {language} code.\n\
         \n\
         {context}\n\
         REQUIREMENTS FOR COMPREHENSIVE FLOWCHART:\n\
         1. Include ALL methods and functions in the code\n\
         2. Show ALL conditional statements and loops with proper loop flow\n\
         3. Show method calls and their relationships\n\
         4. Include error handling flows and exit points\n\
         \n\
         CRITICAL SYNTAX RULES - NO EXCEPTIONS:\n\
         1. Start with \"flowchart TD\" - NEVER use \"graph TD\"\n\
         2. NEVER use \"subgraph\"\n\
         3. NEVER use parentheses in node labels - they break the parser\n\
         4. Use --> for arrows\n\
         \n\
         EXAMPLE:\n\
         flowchart TD\n\
         \x20    Start[Start] --> ValidateInput{{Input parameters valid}}\n\
         \x20    ValidateInput -->|No| ThrowException[Throw exception]\n\
         \x20    ValidateInput -->|Yes| Process[Execute main method]\n\
         \x20    Process --> End[End]\n\
         \x20    ThrowException --> End\n\
         \n\
         ANALYZE THIS CODE AND CREATE A DETAILED FLOWCHART:\n\
         ```{language}\n\
         {code}\n\
         ```\n\
         \n\
         Generate a comprehensive Mermaid flowchart that captures ALL the logic flow, conditions, loops, and method calls in the code:\n",
        context = context_info(analysis),
    )
}

fn local_prompt(code: &str, language: &str, analysis: &CodeAnalysis) -> String {
    format!(
        "You are a code analysis expert. Create a DETAILED Mermaid flowchart for the following {language} code.\n\
         \n\
         {context}\n\
         REQUIREMENTS:\n\
         1. Include ALL methods found in the code\n\
         2. Show ALL conditional statements and loops\n\
         3. Include return statements and exit points\n\
         \n\
         CRITICAL SYNTAX RULES:\n\
         1. Start with \"flowchart TD\"\n\
         2. NEVER use \"subgraph\"\n\
         3. NEVER use parentheses in node labels\n\
         4. Use --> for arrows\n\
         \n\
         ANALYZE THIS CODE AND CREATE A COMPREHENSIVE FLOWCHART:\n\
         ```{language}\n\
         {code}\n\
         ```\n\
         \n\
         Generate a detailed Mermaid flowchart that shows the complete execution flow:",
        context = context_info(analysis),
    )
}

/// Pull the Mermaid source out of a model answer.
///
/// Preference order: a fenced ```mermaid block, then a bare `flowchart TD`
/// section, then the trimmed answer as-is.
pub fn extract_mermaid(response: &str) -> String {
    if let Some(caps) = MERMAID_BLOCK.captures(response) {
        if let Some(body) = caps.get(1) {
            return body.as_str().trim().to_string();
        }
    }

    if let Some(start) = response.find("flowchart TD") {
        let rest = &response[start..];
        let end = ["\n\n", "\n```"]
            .iter()
            .filter_map(|sep| rest.find(sep))
            .min()
            .unwrap_or(rest.len());
        return rest[..end].trim().to_string();
    }

    response.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use httpmock::MockServer;
    use serde_json::json;

    #[test]
    fn keyword_detection_is_case_insensitive() {
        assert!(is_flowchart_request("draw me a Flowchart please"));
        assert!(is_flowchart_request("show the workflow"));
        assert!(!is_flowchart_request("explain this function"));
    }

    #[test]
    fn language_detection_covers_the_big_four() {
        assert_eq!(detect_language("public class Foo {}"), "java");
        assert_eq!(detect_language("const x = 1;"), "javascript");
        assert_eq!(detect_language("def main():\n    pass"), "python");
        assert_eq!(detect_language("namespace App {}"), "csharp");
        assert_eq!(detect_language("SELECT 1"), "unknown");
    }

    #[test]
    fn local_model_heuristics() {
        assert!(is_likely_local_model("ollama:llama3"));
        assert!(is_likely_local_model("codellama:13b"));
        assert!(is_likely_local_model("mistral-7b"));
        assert!(!is_likely_local_model("deepseek-chat"));
    }

    #[test]
    fn analysis_flags_large_files_and_methods() {
        let code = "public class A { public void processOrder() { if (x) {} } public String getName() { } }";
        let a = analyze(code);
        assert!(!a.is_large_file);
        assert!(a.has_business_logic);
        assert_eq!(a.main_methods, vec!["processOrder"]);

        let big = "x\n".repeat(600);
        assert!(analyze(&big).is_large_file);
    }

    #[test]
    fn filter_drops_imports_comments_and_blanks() {
        let code = "import java.util.List;\n\n// comment\npublic class A {\n}\n";
        assert_eq!(filter_large_code(code), "public class A {\n}");
    }

    #[test]
    fn prompt_variant_follows_the_model_kind() {
        let code = "def main():\n    pass";
        let local = build_prompt(code, "python", "ollama:llama3");
        let cloud = build_prompt(code, "python", "deepseek-chat");
        assert!(local.contains("code analysis expert"));
        assert!(cloud.contains("expert code analyzer"));
    }

    #[test]
    fn extracts_fenced_mermaid_block() {
        let resp = "Here you go:\n```mermaid\nflowchart TD\n    A --> B\n```\nDone.";
        assert_eq!(extract_mermaid(resp), "flowchart TD\n    A --> B");
    }

    #[test]
    fn falls_back_to_bare_flowchart_section() {
        let resp = "flowchart TD\n    A --> B\n\nSome trailing prose.";
        assert_eq!(extract_mermaid(resp), "flowchart TD\n    A --> B");
    }

    #[test]
    fn returns_trimmed_response_when_nothing_matches() {
        assert_eq!(extract_mermaid("  no diagram here  "), "no diagram here");
    }

    #[tokio::test]
    async fn end_to_end_extraction_through_the_service() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST").path("/v1/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content":
                        "```mermaid\nflowchart TD\n    Start[Start] --> End[End]\n```"}}]
                }));
            })
            .await;

        let settings = Settings {
            deepseek_api_key: Some("sk-test".into()),
            deepseek_api_url: Some(server.url("/v1/chat/completions")),
            ..Settings::default()
        };
        let svc = AiService::with_client(reqwest::Client::new(), &settings);

        let chart = FlowchartGenerator::new(&svc)
            .generate("def main():\n    pass", "deepseek-chat")
            .await
            .unwrap();
        assert_eq!(chart, "flowchart TD\n    Start[Start] --> End[End]");
    }
}
