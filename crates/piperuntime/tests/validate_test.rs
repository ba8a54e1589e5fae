mod common;

use common::*;
use pipecore::{FlowDefError, Flow, Node, Value};
use piperuntime::{upstream_variables, validate_flow, FlowPlan};

fn linear() -> Flow {
    let mut flow = Flow::new("linear");
    flow.add_node(Node::new("n1", ECHO).with_param("x", 1));
    flow.add_node(Node::new("n2", ECHO).with_param("x", "{{n1.y}}"));
    flow.add_node(Node::new("n3", START));
    flow.connect("n1", "n2", None);
    flow.connect("n2", "n3", None);
    flow
}

#[test]
fn test_valid_flow_yields_plan() {
    let registry = registry();
    let plan = validate_flow(&linear(), &registry).unwrap();
    assert_eq!(
        plan,
        FlowPlan {
            start: "n1".to_string(),
            end_nodes: vec!["n3".to_string()],
        }
    );
}

#[test]
fn test_single_node_flow_is_valid() {
    let registry = registry();
    let mut flow = Flow::new("single");
    flow.add_node(Node::new("only", START));

    let plan = validate_flow(&flow, &registry).unwrap();
    assert_eq!(plan.start, "only");
    assert_eq!(plan.end_nodes, vec!["only"]);
}

#[test]
fn test_structural_errors() {
    let registry = registry();

    let empty = Flow::new("empty");
    assert_eq!(validate_flow(&empty, &registry), Err(FlowDefError::Empty));

    let mut self_loop = linear();
    self_loop.connect("n2", "n2", None);
    assert_eq!(
        validate_flow(&self_loop, &registry),
        Err(FlowDefError::SelfLoop("n2".to_string()))
    );

    let mut duplicate = linear();
    duplicate.connect("n1", "n2", Some("> 0"));
    assert_eq!(
        validate_flow(&duplicate, &registry),
        Err(FlowDefError::DuplicateEdge {
            from: "n1".to_string(),
            to: "n2".to_string(),
        })
    );

    let mut dangling = linear();
    dangling.connect("n3", "ghost", None);
    assert!(matches!(
        validate_flow(&dangling, &registry),
        Err(FlowDefError::DanglingEdge { node_id, .. }) if node_id == "ghost"
    ));

    let mut two_starts = linear();
    two_starts.add_node(Node::new("n4", START));
    two_starts.connect("n4", "n3", None);
    assert_eq!(
        validate_flow(&two_starts, &registry),
        Err(FlowDefError::MultipleStartNodes(vec![
            "n1".to_string(),
            "n4".to_string()
        ]))
    );

    let mut no_start = Flow::new("ring");
    no_start.add_node(Node::new("a", START));
    no_start.add_node(Node::new("b", START));
    no_start.connect("a", "b", None);
    no_start.connect("b", "a", None);
    assert_eq!(validate_flow(&no_start, &registry), Err(FlowDefError::NoStartNode));
}

#[test]
fn test_no_end_node() {
    let registry = registry();
    let mut flow = Flow::new("loop");
    flow.add_node(Node::new("s", START));
    flow.add_node(Node::new("a", START));
    flow.add_node(Node::new("b", START));
    flow.connect("s", "a", None);
    flow.connect("a", "b", None);
    flow.connect("b", "a", None);

    assert_eq!(validate_flow(&flow, &registry), Err(FlowDefError::NoEndNode));
}

#[test]
fn test_start_without_outgoing() {
    let registry = registry();
    let mut flow = Flow::new("detached");
    flow.add_node(Node::new("s", START));
    flow.add_node(Node::new("a", START));
    flow.add_node(Node::new("b", START));
    flow.connect("a", "b", None);
    flow.connect("b", "a", None);

    assert_eq!(
        validate_flow(&flow, &registry),
        Err(FlowDefError::StartWithoutOutgoing("s".to_string()))
    );
}

#[test]
fn test_isolated_node_is_rejected() {
    let registry = registry();
    let mut flow = linear();
    flow.add_node(Node::new("lonely", START));

    // an isolated node is both a start and an end node
    assert!(matches!(
        validate_flow(&flow, &registry),
        Err(FlowDefError::MultipleStartNodes(ids)) if ids.contains(&"lonely".to_string())
    ));
}

#[test]
fn test_no_path_to_end() {
    let registry = registry();
    let mut flow = Flow::new("split");
    for id in ["s", "a", "b", "x", "y", "end"] {
        flow.add_node(Node::new(id, START));
    }
    // s feeds the a/b loop; the only end hangs off the x/y loop
    flow.connect("s", "a", None);
    flow.connect("a", "b", None);
    flow.connect("b", "a", None);
    flow.connect("x", "y", None);
    flow.connect("y", "x", None);
    flow.connect("x", "end", None);

    assert_eq!(validate_flow(&flow, &registry), Err(FlowDefError::NoPathToEnd));
}

#[test]
fn test_instruction_checks() {
    let registry = registry();

    let mut unknown = linear();
    unknown.nodes[2].instruction_id = "missing.instruction".to_string();
    assert_eq!(
        validate_flow(&unknown, &registry),
        Err(FlowDefError::UnknownInstruction {
            node_id: "n3".to_string(),
            instruction_id: "missing.instruction".to_string(),
        })
    );

    let mut missing_param = linear();
    missing_param.nodes[1].params.clear();
    assert_eq!(
        validate_flow(&missing_param, &registry),
        Err(FlowDefError::MissingRequiredParam {
            node_id: "n2".to_string(),
            param: "x".to_string(),
        })
    );
}

#[test]
fn test_upstream_variables() {
    let registry = registry();
    let flow = linear();

    let upstream = upstream_variables(&flow, "n3", &registry).unwrap();
    let ids: Vec<&str> = upstream.iter().map(|n| n.node_id.as_str()).collect();
    assert_eq!(ids, vec!["n2", "n1"]);

    let n1 = &upstream[1];
    assert_eq!(n1.variables.len(), 1);
    assert_eq!(n1.variables[0].name, "{{n1.x}}");
    assert_eq!(n1.variables[0].label, "x");
    assert_eq!(n1.variables[0].value, Value::Int(1));

    assert!(upstream_variables(&flow, "n1", &registry).unwrap().is_empty());
    assert_eq!(
        upstream_variables(&flow, "nope", &registry),
        Err(FlowDefError::NodeNotFound("nope".to_string()))
    );
}
