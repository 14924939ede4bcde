//! Robots.txt parser implementation
//!
//! Permission checks are delegated to the robotstxt crate. Disallow rules and
//! sitemap declarations are also extracted by hand so they can be turned into
//! URL filter excludes and queued sitemap URLs.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = parse content)
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The user agent string
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Returns all `Sitemap:` URLs declared in the file
    ///
    /// Sitemap lines are global and do not belong to any user-agent group.
    pub fn sitemaps(&self) -> Vec<String> {
        directives(&self.content)
            .filter(|(key, value)| key == "sitemap" && !value.is_empty())
            .map(|(_, value)| value.to_string())
            .collect()
    }

    /// Returns the Disallow paths that apply to `user_agent`
    ///
    /// Groups naming the agent take precedence over the `*` group, matching
    /// the usual robots.txt group selection.
    pub fn disallowed_paths(&self, user_agent: &str) -> Vec<String> {
        if self.allow_all || self.content.is_empty() {
            return Vec::new();
        }

        let normalized_agent = user_agent.to_lowercase();
        let mut current_agents: Vec<String> = Vec::new();
        let mut in_agent_block = false;
        let mut for_agent: Vec<String> = Vec::new();
        let mut for_wildcard: Vec<String> = Vec::new();
        let mut agent_group_seen = false;

        for (key, value) in directives(&self.content) {
            match key.as_str() {
                "user-agent" => {
                    // Consecutive User-agent lines share one group
                    if !in_agent_block {
                        current_agents.clear();
                    }
                    current_agents.push(value.to_lowercase());
                    in_agent_block = true;
                }
                "disallow" | "allow" => {
                    in_agent_block = false;
                    let specific = current_agents
                        .iter()
                        .any(|ua| ua != "*" && normalized_agent.contains(ua.as_str()));
                    let wildcard = current_agents.iter().any(|ua| ua == "*");

                    if specific {
                        agent_group_seen = true;
                    }
                    if key != "disallow" || value.is_empty() {
                        continue;
                    }
                    if specific {
                        for_agent.push(value.to_string());
                    } else if wildcard {
                        for_wildcard.push(value.to_string());
                    }
                }
                _ => {
                    in_agent_block = false;
                }
            }
        }

        if agent_group_seen {
            for_agent
        } else {
            for_wildcard
        }
    }
}

/// Iterates over `key: value` directives, skipping comments and blank lines
fn directives(content: &str) -> impl Iterator<Item = (String, &str)> {
    content.lines().filter_map(|line| {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed
            .split_once(':')
            .map(|(key, value)| (key.trim().to_lowercase(), value.trim()))
    })
}
