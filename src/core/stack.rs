//! Developer stack classification
//!
//! Maps executable names onto well-known developer tooling stacks and
//! aggregates a snapshot into per-stack groups.

use serde::Serialize;

use super::process::ProcessRecord;

/// Processes of a snapshot that belong to one stack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevGroup {
    pub stack: String,
    pub processes: Vec<ProcessRecord>,
    pub total_cpu: f64,
    pub total_mem: f64,
}

/// Lookup table of stack label to lowercase executable names
const STACKS: &[(&str, &[&str])] = &[
    (
        "Node.js",
        &[
            "node", "npm", "npx", "yarn", "pnpm", "tsx", "ts-node", "next", "vite", "webpack",
            "esbuild", "bun", "deno",
        ],
    ),
    (
        "Python",
        &[
            "python", "python3", "pip", "pip3", "uvicorn", "gunicorn", "flask", "django",
            "celery", "jupyter", "ipython", "conda", "poetry", "uv",
        ],
    ),
    (
        "Docker",
        &[
            "docker",
            "dockerd",
            "containerd",
            "docker-compose",
            "com.docker.vmnetd",
            "com.docker.backend",
            "com.docker.hyperkit",
        ],
    ),
    (
        "Database",
        &[
            "postgres", "postgresql", "psql", "mysql", "mysqld", "mongod", "mongos",
            "redis-server", "redis-cli", "sqlite3",
        ],
    ),
    (
        "Java",
        &["java", "javac", "gradle", "gradlew", "mvn", "maven", "kotlin", "kotlinc", "sbt"],
    ),
    ("Go", &["go", "gopls", "dlv", "go-build", "gofmt"]),
    (
        "Ruby",
        &["ruby", "irb", "rails", "rake", "bundler", "gem", "puma", "sidekiq"],
    ),
    ("Rust", &["rustc", "cargo", "rustup", "rust-analyzer"]),
    ("Web Server", &["nginx", "apache", "httpd", "caddy", "traefik"]),
];

/// Names starting with this prefix are container tooling
const CONTAINER_PREFIX: &str = "docker";
const CONTAINER_STACK: &str = "Docker";

/// Classify a process name, returning its stack label if known
pub fn classify(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    for (label, names) in STACKS {
        if names.contains(&lower.as_str()) {
            return Some(*label);
        }
    }
    if lower.starts_with(CONTAINER_PREFIX) {
        return Some(CONTAINER_STACK);
    }
    None
}

/// Group records by stack in first-seen order.
/// Records with no known stack are left out.
pub fn group_by_stack(records: &[ProcessRecord]) -> Vec<DevGroup> {
    let mut groups: Vec<DevGroup> = Vec::new();

    for record in records {
        let Some(label) = classify(&record.name) else {
            continue;
        };
        let index = match groups.iter().position(|g| g.stack == label) {
            Some(i) => i,
            None => {
                groups.push(DevGroup {
                    stack: label.to_string(),
                    processes: Vec::new(),
                    total_cpu: 0.0,
                    total_mem: 0.0,
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[index];
        group.total_cpu += record.cpu;
        group.total_mem += record.mem;
        group.processes.push(record.clone());
    }

    groups
}
