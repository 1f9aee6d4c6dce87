//! `petlead list`: registered strategies and configured sites.

use petlead_core::ScrapeConfig;
use petlead_scraper::StrategyRegistry;

pub(crate) fn render(config: &ScrapeConfig, registry: &StrategyRegistry) -> Vec<String> {
    let mut lines = vec!["Available strategies:".to_string()];
    for factory in registry.iter() {
        let used_by: Vec<&str> = config
            .websites
            .iter()
            .filter(|(_, site)| site.strategy.trim() == factory.id())
            .map(|(id, _)| id.as_str())
            .collect();
        let used = if used_by.is_empty() {
            String::new()
        } else {
            format!("  [{}]", used_by.join(", "))
        };
        lines.push(format!(
            "  {:<14} {}{used}",
            factory.id(),
            factory.description()
        ));
    }

    lines.push(String::new());
    lines.push("Configured sites:".to_string());
    for (id, site) in &config.websites {
        let marker = if site.enabled { '\u{2713}' } else { '\u{2717}' };
        let strategy = if registry.get(site.strategy.trim()).is_some() {
            site.strategy.clone()
        } else {
            format!("{} (unknown)", site.strategy)
        };
        let state = if site.enabled { "" } else { "  disabled" };
        lines.push(format!(
            "  {marker} {id:<14} {:<20} {strategy:<24} {}{state}",
            site.name, site.url
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r"
websites:
  bozita:
    name: Bozita
    url: https://bozita.com/de/fachhandler-suchen/
    enabled: true
    strategy: json_feed
  belcando:
    name: Belcando
    url: https://www.belcando.de/haendlersuche
    enabled: false
    strategy: selenium_belcando
search_locations:
  major_cities: [Berlin]
  radius_km: 50
";

    #[test]
    fn lists_strategies_with_their_sites() {
        let config = petlead_core::parse_config(CONFIG).unwrap();
        let lines = render(&config, &StrategyRegistry::with_builtin());

        assert_eq!(lines[0], "Available strategies:");
        assert!(lines[1].contains("json_feed") && lines[1].ends_with("[bozita]"));
        assert!(lines[2].contains("json_search") && !lines[2].contains('['));
    }

    #[test]
    fn marks_disabled_sites_and_unknown_strategies() {
        let config = petlead_core::parse_config(CONFIG).unwrap();
        let lines = render(&config, &StrategyRegistry::with_builtin());

        let bozita = lines.iter().find(|l| l.contains("bozita ")).unwrap();
        assert!(bozita.contains('\u{2713}'));
        let belcando = lines.iter().find(|l| l.contains("belcando ")).unwrap();
        assert!(belcando.contains('\u{2717}'));
        assert!(belcando.contains("selenium_belcando (unknown)"));
        assert!(belcando.ends_with("disabled"));
    }
}
