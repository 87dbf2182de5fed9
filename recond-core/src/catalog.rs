//! The recon module catalog.
//!
//! Every selectable module expands to a pipeline of external commands run
//! against the project's scope snapshot and results directory. The tools
//! themselves (subfinder, httpx, nuclei, ...) are opaque black boxes; the
//! catalog only knows how to invoke them and where their output lands.

use std::path::{Path, PathBuf};

use recond_model::{ModuleInfo, Scope};

/// Wordlists follow the conventional operator layout; the shell expands `~`.
const COMMON_WORDLIST: &str = "~/tools/wordlists/common.txt";

/// A selectable recon module.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CATALOG: &[ToolSpec] = &[
    ToolSpec {
        id: "subfinder",
        name: "Subdomain Discovery",
        description: "Enumerate subdomains for every wildcard in scope.",
    },
    ToolSpec {
        id: "probe",
        name: "HTTP Probe",
        description: "Probe discovered subdomains for live HTTP services.",
    },
    ToolSpec {
        id: "port_scan",
        name: "Port Scan",
        description: "Scan live hosts for open ports.",
    },
    ToolSpec {
        id: "urls_crawler",
        name: "URL Finder",
        description: "Collect historical and crawled URLs for live hosts.",
    },
    ToolSpec {
        id: "js_crawler",
        name: "JS Scanner",
        description: "Extract JavaScript files and endpoints from live hosts.",
    },
    ToolSpec {
        id: "tech_detect",
        name: "Tech Detection",
        description: "Fingerprint web technologies on live hosts.",
    },
    ToolSpec {
        id: "paramspyder",
        name: "Hidden Parameter",
        description: "Mine URL lists for hidden query parameters.",
    },
    ToolSpec {
        id: "fuzzer",
        name: "Fuzzer",
        description: "Fuzz live hosts for common paths.",
    },
    ToolSpec {
        id: "vuln_scan",
        name: "Vulnerability Scan",
        description: "Run template-based vulnerability checks against live hosts.",
    },
    ToolSpec {
        id: "xss_scan",
        name: "XSS Scan",
        description: "Scan collected URLs for reflected XSS.",
    },
    ToolSpec {
        id: "sqli_scan",
        name: "SQLi Scan",
        description: "Test parameterized URLs for SQL injection.",
    },
    ToolSpec {
        id: "screenshot",
        name: "Screenshot",
        description: "Capture screenshots of live HTTP services.",
    },
];

pub fn find(id: &str) -> Option<&'static ToolSpec> {
    CATALOG.iter().find(|spec| spec.id == id)
}

/// Catalog entries as served by `GET /api/modules`.
pub fn modules() -> Vec<ModuleInfo> {
    CATALOG
        .iter()
        .map(|spec| ModuleInfo {
            name: spec.id.to_string(),
            description: spec.description.to_string(),
            locked: false,
        })
        .collect()
}

/// One external command within a module pipeline.
#[derive(Debug, Clone)]
pub struct CommandStep {
    /// Human-readable form echoed into the job log.
    pub title: String,
    pub program: String,
    pub args: Vec<String>,
}

impl CommandStep {
    pub fn new(program: &str, args: impl IntoIterator<Item = String>) -> Self {
        let args: Vec<String> = args.into_iter().collect();
        Self {
            title: format!("{} {}", program, args.join(" ")),
            program: program.to_string(),
            args,
        }
    }

    /// A step executed through `sh -c`, for pipelines the original tools
    /// cannot express themselves.
    pub fn shell(script: impl Into<String>) -> Self {
        let script = script.into();
        Self {
            title: script.clone(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script],
        }
    }
}

/// A module pipeline ready for the runner.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Logged before any step runs; also carries the reason when a module is
    /// skipped without steps.
    pub note: Option<String>,
    /// Output directories created before the first step.
    pub dirs: Vec<PathBuf>,
    pub steps: Vec<CommandStep>,
}

impl Plan {
    pub fn skip(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }
}

/// Expands a module id into its command pipeline for one project.
///
/// Unknown ids produce an empty skip plan; the job controller records them
/// as failed executions before ever reaching here.
pub fn plan(id: &str, scope: &Scope, project_dir: &Path) -> Plan {
    let subs_dir = project_dir.join("subs");
    let active_dir = project_dir.join("active");
    let urls_dir = project_dir.join("urls");
    let info_dir = project_dir.join("info");
    let ports_dir = project_dir.join("ports");
    let vulns_dir = project_dir.join("vulns");

    let active_subs = active_dir.join("active-subs.txt");
    let active_urls = urls_dir.join("active_urls.txt");
    let final_urls = urls_dir.join("final-urls.txt");
    let js_urls = urls_dir.join("active-js-urls.txt");

    match id {
        "subfinder" => {
            let roots = scope.wildcard_roots();
            if roots.is_empty() {
                return Plan::skip(
                    "No wildcard domains found in scope. Skipping subdomain discovery.",
                );
            }
            let steps = roots
                .iter()
                .map(|root| {
                    CommandStep::new(
                        "subfinder",
                        [
                            "-d".into(),
                            root.clone(),
                            "-all".into(),
                            "-silent".into(),
                            "-o".into(),
                            path_arg(&subs_dir.join(format!("{root}_subs.txt"))),
                        ],
                    )
                })
                .collect();
            Plan {
                note: Some(format!(
                    "Found {} wildcard domains to process sequentially.",
                    roots.len()
                )),
                dirs: vec![subs_dir],
                steps,
            }
        }
        "probe" => Plan {
            note: None,
            dirs: vec![active_dir.clone()],
            steps: vec![CommandStep::shell(format!(
                "cat {}/*_subs.txt 2>/dev/null | sort -u | httpx -silent -o {}",
                path_arg(&subs_dir),
                path_arg(&active_subs),
            ))],
        },
        "port_scan" => match require(&active_subs) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![ports_dir.clone()],
                steps: vec![
                    CommandStep::new(
                        "naabu",
                        [
                            "-list".into(),
                            path_arg(&active_subs),
                            "-silent".into(),
                            "-o".into(),
                            path_arg(&ports_dir.join("naabu.txt")),
                        ],
                    ),
                    CommandStep::new(
                        "nmap",
                        [
                            "-iL".into(),
                            path_arg(&active_subs),
                            "-oN".into(),
                            path_arg(&ports_dir.join("nmap.txt")),
                        ],
                    ),
                ],
            },
        },
        "urls_crawler" => match require(&active_subs) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![urls_dir.clone()],
                steps: vec![
                    CommandStep::shell(format!(
                        "cat {} | waybackurls | anew -q {}",
                        path_arg(&active_subs),
                        path_arg(&active_urls),
                    )),
                    CommandStep::shell(format!(
                        "cat {} | gau | anew -q {}",
                        path_arg(&active_subs),
                        path_arg(&active_urls),
                    )),
                    CommandStep::shell(format!(
                        "sort -u {} > {}",
                        path_arg(&active_urls),
                        path_arg(&final_urls),
                    )),
                ],
            },
        },
        "js_crawler" => match require(&active_subs) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![urls_dir.clone()],
                steps: vec![
                    CommandStep::shell(format!(
                        "getJS -input {} --complete | anew -q {}",
                        path_arg(&active_subs),
                        path_arg(&js_urls),
                    )),
                    CommandStep::shell(format!(
                        "subjs -i {} | anew -q {}",
                        path_arg(&active_subs),
                        path_arg(&js_urls),
                    )),
                ],
            },
        },
        "tech_detect" => match require(&active_subs) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![info_dir.clone()],
                steps: vec![CommandStep::new(
                    "httpx",
                    [
                        "-l".into(),
                        path_arg(&active_subs),
                        "-tech-detect".into(),
                        "-silent".into(),
                        "-o".into(),
                        path_arg(&info_dir.join("tech.txt")),
                    ],
                )],
            },
        },
        "paramspyder" => match require(&final_urls) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![info_dir.clone()],
                steps: vec![CommandStep::shell(format!(
                    "cat {} | sort -u | unfurl --unique keys | anew -q {}",
                    path_arg(&final_urls),
                    path_arg(&info_dir.join("paramlist.txt")),
                ))],
            },
        },
        "fuzzer" => match require(&active_subs) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![info_dir.clone()],
                steps: vec![CommandStep::shell(format!(
                    "for url in $(cat {}); do ffuf -w {} -u \"$url/FUZZ\" -s -mc 200; done | tee {}",
                    path_arg(&active_subs),
                    COMMON_WORDLIST,
                    path_arg(&info_dir.join("ffuf.txt")),
                ))],
            },
        },
        "vuln_scan" => match require(&active_subs) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![vulns_dir.clone()],
                steps: ["low", "medium", "high", "critical"]
                    .iter()
                    .map(|severity| {
                        CommandStep::new(
                            "nuclei",
                            [
                                "-l".into(),
                                path_arg(&active_subs),
                                "-s".into(),
                                (*severity).into(),
                                "-o".into(),
                                path_arg(&vulns_dir.join(format!("nuclei_{severity}.txt"))),
                            ],
                        )
                    })
                    .collect(),
            },
        },
        "xss_scan" => match require(&active_urls) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![vulns_dir.clone()],
                steps: vec![CommandStep::new(
                    "dalfox",
                    [
                        "file".into(),
                        path_arg(&active_urls),
                        "-o".into(),
                        path_arg(&vulns_dir.join("dalfox.txt")),
                    ],
                )],
            },
        },
        "sqli_scan" => match require(&final_urls) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![vulns_dir.clone()],
                steps: vec![CommandStep::shell(format!(
                    "sqlmap -m {} --batch --smart --output-dir {}",
                    path_arg(&final_urls),
                    path_arg(&vulns_dir.join("sqlmap")),
                ))],
            },
        },
        "screenshot" => match require(&active_subs) {
            Err(plan) => plan,
            Ok(()) => Plan {
                note: None,
                dirs: vec![project_dir.join("shots")],
                steps: vec![CommandStep::shell(format!(
                    "cat {} | aquatone -out {}",
                    path_arg(&active_subs),
                    path_arg(&project_dir.join("shots")),
                ))],
            },
        },
        _ => Plan::skip(format!("Module {id:?} is not recognized.")),
    }
}

/// Modules further down the pipeline depend on earlier output files; when the
/// input is missing the module is skipped with a pointer at the prerequisite,
/// matching the original dashboard behavior.
fn require(input: &Path) -> std::result::Result<(), Plan> {
    if input.exists() {
        Ok(())
    } else {
        Err(Plan::skip(format!(
            "{} not found, run the earlier discovery modules first.",
            input.display()
        )))
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_id_is_unique() {
        let mut ids: Vec<_> = CATALOG.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn subfinder_plans_one_step_per_wildcard() {
        let scope = Scope {
            wildcards: vec!["*.acme.com".into(), "*.corp.io".into()],
            ..Scope::default()
        };
        let plan = plan("subfinder", &scope, Path::new("/tmp/acme"));
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[0].title.contains("acme.com"));
        assert!(plan.steps[1].title.contains("corp.io"));
    }

    #[test]
    fn subfinder_skips_without_wildcards() {
        let plan = plan("subfinder", &Scope::default(), Path::new("/tmp/acme"));
        assert!(plan.steps.is_empty());
        assert!(plan.note.as_deref().unwrap_or("").contains("Skipping"));
    }

    #[test]
    fn dependent_modules_skip_when_input_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        for id in ["port_scan", "urls_crawler", "paramspyder", "xss_scan"] {
            let plan = plan(id, &Scope::default(), dir.path());
            assert!(plan.steps.is_empty(), "{id} should skip");
            assert!(plan.note.is_some(), "{id} should explain the skip");
        }
    }
}
