//! Prompt templates for the two analysis modes.
//!
//! Templates are static text; only the user's message and the code
//! description are interpolated, verbatim. Escaping is left to the JSON
//! serializer at dispatch time.

use std::str::FromStr;

/// Which template and system instruction govern a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalysisMode {
    #[default]
    CheatDetection,
    VulnerabilityDetection,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::CheatDetection => "cheat",
            AnalysisMode::VulnerabilityDetection => "vulnerability",
        }
    }

    /// What a selection analysis looks for, as shown to the user.
    pub fn subject(&self) -> &'static str {
        match self {
            AnalysisMode::CheatDetection => "cheat/hack capabilities",
            AnalysisMode::VulnerabilityDetection => "security vulnerabilities",
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cheat" | "cheat-detection" => Ok(AnalysisMode::CheatDetection),
            "vulnerability" | "vuln" | "vulnerability-detection" => {
                Ok(AnalysisMode::VulnerabilityDetection)
            }
            other => Err(format!(
                "invalid mode {:?}, must be 'cheat' or 'vulnerability'",
                other
            )),
        }
    }
}

/// System instruction sent alongside the prompt.
pub fn system_instruction(mode: AnalysisMode) -> &'static str {
    match mode {
        AnalysisMode::CheatDetection => {
            "You are an expert security analyst specializing in reverse engineering, \
             anti-cheat engineering, and .NET/Mono code analysis. Analyze the following code \
             and provide detailed, technical analysis of how it could be abused by game cheats."
        }
        AnalysisMode::VulnerabilityDetection => {
            "You are an expert security analyst specializing in reverse engineering, \
             vulnerability analysis, and .NET/Mono code analysis. Analyze the following code \
             and provide detailed, technical analysis focused on security vulnerabilities."
        }
    }
}

/// Render the full prompt for `mode`.
pub fn build(mode: AnalysisMode, user_message: &str, description: &str) -> String {
    match mode {
        AnalysisMode::CheatDetection => cheat_detection(user_message, description),
        AnalysisMode::VulnerabilityDetection => vulnerability_detection(user_message, description),
    }
}

fn cheat_detection(user_message: &str, description: &str) -> String {
    format!(
        r#"You are a cybersecurity expert specializing in .NET/Mono reverse engineering and cheat detection.

{user_message}

**CODE TO ANALYZE:**
{description}

**CHEAT EXPOSURE ANALYSIS:**
1. Examine the provided IL (Intermediate Language) code carefully
2. Identify patterns a cheat could exploit in this code
3. Focus on:
   - Client-authoritative state (values set locally without server validation)
   - Memory manipulation opportunities
   - Missing input validation
   - Hardcoded values that could be modified (health, ammo, currency)
   - Network message spoofing potential
   - Game state manipulation
   - Timing and movement checks open to speed hacks
   - Visibility data exposed to the client (wallhack/ESP risk)
   - Aim-related state open to automation

**PROVIDE:**
- Specific cheat capabilities this code exposes
- Exploitation risk assessment (Low/Medium/High) per finding
- Concrete description of how each weakness would be abused, referencing the IL
- Which checks belong on the server or in anti-cheat instrumentation

Be thorough and focus specifically on game cheats."#
    )
}

fn vulnerability_detection(user_message: &str, description: &str) -> String {
    format!(
        r#"You are a cybersecurity expert specializing in .NET/Mono security vulnerability analysis and defensive security research.

**PROFESSIONAL CONTEXT:**
This analysis is part of an authorized security assessment. Its purpose is to identify defensive security gaps and inform hardening decisions.

**ASSESSMENT OBJECTIVES:**
- Identify high-impact security weaknesses requiring immediate attention
- Map attack surface exposure for defensive planning
- Evaluate impact scenarios for risk assessment

{user_message}

**CODE TO ANALYZE:**
{description}

**ANALYSIS PARAMETERS:**
PRIORITY: Report ONLY HIGH and CRITICAL severity vulnerabilities. Ignore Low/Medium findings unless they contribute to a high-severity chain.

HIGH-IMPACT AREAS:
- Remote code execution
- Denial of service
- Authentication/authorization bypass leading to privilege escalation
- Unsafe deserialization
- Memory corruption
- Unsafe native interop
- Injection with system-level access
- Path traversal

**OUTPUT FORMAT:**

**VULNERABILITY SUMMARY:**
V1. [Vulnerability Name]
--- [1-2 sentence summary with impact assessment]
```il
[Key IL snippet]
```

V2. [Vulnerability Name]
--- [1-2 sentence summary with impact assessment]
```il
[Key IL snippet]
```

[Continue for every HIGH/CRITICAL finding...]

**DETAILED ATTACK SURFACE ANALYSIS:**

**V1. [Vulnerability Name]**
- **Severity:** [CRITICAL/HIGH]
- **Attack Vector:** [Local/Remote/Network/Physical]
- **Methodology:** [How the weakness is reached and triggered]
- **Structural Evidence:** [Specific IL patterns and metadata that create the weakness]
- **Exposure:** [How an attacker could reach this code path]

**V2. [Vulnerability Name]**
[Same format for each finding...]

**CONSTRAINTS:**
- Ground every finding in the IL and metadata provided
- Do NOT include remediation advice; this pass is analysis only
- Omit findings you cannot tie to concrete code"#
    )
}
