use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::EntityCatalog;

/// Summary of FK graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for FK dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphReport {
    pub summary: FkGraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic parent-before-child ordering of the catalog's entities.
///
/// Fake entities and fake foreign keys produce no tables and are ignored.
/// Self references do not constrain the order.
pub fn build_fk_graph_report(catalog: &EntityCatalog) -> FkGraphReport {
    let graph = build_adjacency(catalog);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = FkGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => FkGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => FkGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(catalog: &EntityCatalog) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for entity in catalog.entities().filter(|entity| !entity.is_fake()) {
        graph.entry(entity.mneo().to_string()).or_default();

        for fk in entity.foreign_keys() {
            if fk.is_fake() || fk.parent() == entity.mneo() {
                continue;
            }
            let parent_is_table = catalog
                .get(fk.parent())
                .is_some_and(|parent| !parent.is_fake());
            if parent_is_table {
                graph
                    .entry(fk.parent().to_string())
                    .or_default()
                    .insert(entity.mneo().to_string());
            }
        }
    }

    graph
}

/// Parent-before-child order that always covers every table.
///
/// When only cycles remain, the smallest mnemonic sitting on a cycle is
/// placed next. Foreign keys from it to tables placed later close the cycle
/// and must be added once every table exists.
pub fn creation_order(catalog: &EntityCatalog) -> Vec<String> {
    order_nodes(&build_adjacency(catalog), true).0
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let (order, stuck) = order_nodes(graph, false);
    if stuck.is_empty() {
        Ok(order)
    } else {
        Err(stuck)
    }
}

// Kahn's algorithm; returns the order plus the nodes left inside cycles.
fn order_nodes(
    graph: &BTreeMap<String, BTreeSet<String>>,
    break_cycles: bool,
) -> (Vec<String>, Vec<String>) {
    let mut indegree: BTreeMap<String, usize> = BTreeMap::new();

    for node in graph.keys() {
        indegree.entry(node.clone()).or_insert(0);
    }

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| node.clone()))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    loop {
        while let Some(node) = ready.pop_first() {
            if let Some(targets) = graph.get(&node) {
                for target in targets {
                    if let Some(count) = indegree.get_mut(target) {
                        if *count > 0 {
                            *count -= 1;
                            if *count == 0 {
                                ready.insert(target.clone());
                            }
                        }
                    }
                }
            }
            order.push(node);
        }

        if !break_cycles || order.len() == graph.len() {
            break;
        }
        let remaining: BTreeSet<&String> = indegree
            .iter()
            .filter_map(|(node, count)| (*count > 0).then_some(node))
            .collect();
        let Some(next) = remaining
            .iter()
            .find(|node| on_cycle(graph, &remaining, node))
            .or_else(|| remaining.first())
            .map(|node| (*node).clone())
        else {
            break;
        };
        indegree.insert(next.clone(), 0);
        ready.insert(next);
    }

    let stuck = indegree
        .into_iter()
        .filter_map(|(node, count)| (count > 0).then_some(node))
        .collect();
    (order, stuck)
}

fn on_cycle(
    graph: &BTreeMap<String, BTreeSet<String>>,
    remaining: &BTreeSet<&String>,
    start: &String,
) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&String> = vec![start];
    while let Some(node) = stack.pop() {
        for target in graph.get(node).into_iter().flatten() {
            if target == start {
                return true;
            }
            if remaining.contains(target) && seen.insert(target) {
                stack.push(target);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::domain::DomainRegistry;
    use crate::entity::EntityDefinition;
    use crate::relationship::EntityForeignKey;
    use crate::types::SqlType;

    fn entity(mneo: &str, parents: &[&str]) -> EntityDefinition {
        let mut builder = EntityDefinition::builder(mneo, format!("{mneo}_table"))
            .column(Column::pk(format!("c_{mneo}_id"), SqlType::Char).size(10));
        for parent in parents {
            builder = builder
                .column(Column::fk(format!("c_{parent}_id"), SqlType::Char).size(10))
                .foreign_key(EntityForeignKey::builder(format!("fk_{mneo}_{parent}"), *parent));
        }
        builder.build().unwrap()
    }

    fn catalog(entities: Vec<EntityDefinition>) -> EntityCatalog {
        let mut catalog = EntityCatalog::new(DomainRegistry::default());
        for entity in entities {
            catalog.insert(entity).unwrap();
        }
        catalog
    }

    #[test]
    fn toposort_orders_dependencies() {
        let report = build_fk_graph_report(&catalog(vec![
            entity("ord", &["usr"]),
            entity("usr", &[]),
        ]));
        let order = report.topo_order.expect("expected toposort");
        let users_idx = order.iter().position(|item| item == "usr").unwrap();
        let orders_idx = order.iter().position(|item| item == "ord").unwrap();
        assert!(users_idx < orders_idx);
        assert_eq!(report.summary.edges, 1);
    }

    #[test]
    fn toposort_reports_cycle() {
        let report = build_fk_graph_report(&catalog(vec![
            entity("aaa", &["bbb"]),
            entity("bbb", &["aaa"]),
        ]));
        assert!(report.topo_order.is_none());
        assert!(report.cycle.as_ref().unwrap().contains(&"aaa".to_string()));
    }

    #[test]
    fn creation_order_breaks_cycles_deterministically() {
        let catalog = catalog(vec![
            entity("suc", &["emp"]),
            entity("emp", &["suc"]),
            entity("dep", &["suc"]),
            entity("usr", &[]),
        ]);
        assert!(build_fk_graph_report(&catalog).topo_order.is_none());
        assert_eq!(creation_order(&catalog), ["usr", "emp", "suc", "dep"]);
    }

    #[test]
    fn creation_order_matches_toposort_without_cycles() {
        let catalog = catalog(vec![entity("ord", &["usr"]), entity("usr", &[])]);
        assert_eq!(
            Some(creation_order(&catalog)),
            build_fk_graph_report(&catalog).topo_order
        );
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let tree = EntityDefinition::builder("tree", "nodes")
            .column(Column::pk("c_tree_id", SqlType::Char).size(10))
            .column(Column::fk("c_parent_id", SqlType::Char).size(10).nullable())
            .foreign_key(EntityForeignKey::builder("fk_tree_parent", "tree").map("c_tree_id", "c_parent_id"))
            .build()
            .unwrap();
        let report = build_fk_graph_report(&catalog(vec![tree]));
        assert_eq!(report.topo_order, Some(vec!["tree".to_string()]));
    }
}
