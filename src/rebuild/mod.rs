//! Rebuilder: synthesizes the deployment artifacts a liberated project needs
//! to run anywhere a container runtime exists.
//!
//! Generated content depends only on the project name and detected
//! capabilities, never on the scanned source, and is deterministic so
//! repeated runs are byte-identical. Artifacts reference nothing outside the
//! output tree.

#![allow(missing_docs)]

use serde::Serialize;
use serde_json::json;

use crate::core::tree::FileEntry;
use crate::scanner::patterns::REGISTRY_VERSION;

/// Pipeline version stamped into the liberation manifest.
pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capability flags detected from the cleaned tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Tree ships its own server code alongside the static frontend.
    pub has_backend: bool,
    /// Tree uses client-side routing and needs the SPA fallback.
    pub has_spa_router: bool,
}

impl Capabilities {
    /// Cheap structural detection over the cleaned tree.
    #[must_use]
    pub fn detect(files: &[FileEntry]) -> Self {
        let mut caps = Self::default();
        for file in files {
            if file.path.starts_with("server/") || file.path.starts_with("api/") {
                caps.has_backend = true;
            }
            if let Some(text) = file.as_text()
                && (text.contains("react-router") || text.contains("createBrowserRouter"))
            {
                caps.has_spa_router = true;
            }
        }
        caps
    }
}

/// The five generated deployment artifacts.
#[derive(Debug, Clone)]
pub struct GeneratedArtifacts {
    pub files: Vec<FileEntry>,
}

/// Synthesize deployment artifacts for `project_name`.
#[must_use]
pub fn rebuild(project_name: &str, capabilities: &Capabilities) -> GeneratedArtifacts {
    let slug = container_slug(project_name);
    GeneratedArtifacts {
        files: vec![
            FileEntry::text("Dockerfile", &dockerfile()),
            FileEntry::text("docker-compose.yml", &compose_manifest(&slug)),
            FileEntry::text("nginx.conf", &nginx_conf()),
            FileEntry::text("deploy.sh", &deploy_script(&slug)),
            FileEntry::text(
                "liberation-manifest.json",
                &liberation_manifest(project_name, capabilities),
            ),
        ],
    }
}

/// Container-safe name: lowercase alphanumerics and dashes, never empty.
fn container_slug(project_name: &str) -> String {
    let slug: String = project_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "liberated-app".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Multi-stage build: dependency install, build, static serve.
fn dockerfile() -> String {
    r"# syntax=docker/dockerfile:1

FROM node:20-alpine AS deps
WORKDIR /app
COPY package.json ./
RUN npm install --no-audit --no-fund

FROM node:20-alpine AS build
WORKDIR /app
COPY --from=deps /app/node_modules ./node_modules
COPY . .
RUN npm run build

FROM nginx:1.27-alpine AS serve
COPY nginx.conf /etc/nginx/conf.d/default.conf
COPY --from=build /app/dist /usr/share/nginx/html
EXPOSE 80
HEALTHCHECK --interval=30s --timeout=3s CMD wget -qO- http://127.0.0.1/healthz || exit 1
"
    .to_string()
}

/// App container plus the auto-update sidecar.
fn compose_manifest(slug: &str) -> String {
    format!(
        r#"services:
  app:
    build: .
    container_name: {slug}
    restart: unless-stopped
    ports:
      - "8080:80"
    labels:
      com.centurylinklabs.watchtower.enable: "true"

  watchtower:
    image: containrrr/watchtower:latest
    restart: unless-stopped
    volumes:
      - /var/run/docker.sock:/var/run/docker.sock
    command: --label-enable --cleanup --interval 300
"#
    )
}

/// gzip, SPA fallback routing, unauthenticated health endpoint.
fn nginx_conf() -> String {
    r#"server {
    listen 80;
    server_name _;

    root /usr/share/nginx/html;
    index index.html;

    gzip on;
    gzip_types text/plain text/css application/javascript application/json image/svg+xml;

    location = /healthz {
        access_log off;
        default_type text/plain;
        return 200 "ok";
    }

    location / {
        try_files $uri $uri/ /index.html;
    }
}
"#
    .to_string()
}

/// Idempotent bring-up: installs the container runtime only when absent.
fn deploy_script(slug: &str) -> String {
    format!(
        r#"#!/usr/bin/env bash
set -euo pipefail

if ! command -v docker >/dev/null 2>&1; then
    echo "docker not found, installing..."
    curl -fsSL https://get.docker.com | sh
fi

if docker compose version >/dev/null 2>&1; then
    COMPOSE="docker compose"
else
    COMPOSE="docker-compose"
fi

$COMPOSE up -d --build
echo "{slug} is up. Health: http://localhost:8080/healthz"
"#
    )
}

/// Machine-readable record of what produced this tree.
fn liberation_manifest(project_name: &str, capabilities: &Capabilities) -> String {
    let manifest = json!({
        "name": project_name,
        "generator": "plh",
        "pipelineVersion": PIPELINE_VERSION,
        "registryVersion": REGISTRY_VERSION,
        "capabilities": capabilities,
    });
    let mut rendered = serde_json::to_string_pretty(&manifest)
        .unwrap_or_else(|_| String::from("{}"));
    rendered.push('\n');
    rendered
}
