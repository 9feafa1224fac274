#[cfg(test)]
mod mesh_scenarios {
    use std::io::{Cursor, Write};

    use containmesh::config::MeshConfig;
    use containmesh::config_loader::resolve_config;
    use containmesh::error::MeshError;
    use containmesh::mesh::{build, reap, BuildOptions, LifecycleTracker, NodeState, ReapOptions};
    use containmesh::orchestrator::{run_build, run_teardown, Session};
    use containmesh::progress::{NullSink, RecordingSink};
    use containmesh::runtime::{ContainerRuntime, ContainerSpec, InMemoryRuntime, NetworkSpec};
    use containmesh::topology::{acquire, AdjacencyMatrix, Topology};
    use tempfile::NamedTempFile;

    fn directed_pair() -> AdjacencyMatrix {
        AdjacencyMatrix::from_rows(vec![vec![false, true], vec![false, false]])
    }

    fn sorted(mut names: Vec<String>) -> Vec<String> {
        names.sort();
        names
    }

    /// Two groups of three, one link from group 0 into network 1.
    #[test]
    fn test_two_by_three_directed_link() {
        let runtime = InMemoryRuntime::new();
        let topology = Topology::new(2, 3, 1, "img", "net");
        let env = build(&topology, &directed_pair(), &runtime, &NullSink).unwrap();

        assert_eq!(sorted(runtime.network_names()), vec!["net0", "net1"]);
        for i in 0..3 {
            let name = format!("cont_img{}", i);
            let expected: Vec<String> = if i == 0 {
                vec!["net0".into(), "net1".into()]
            } else {
                vec!["net0".into()]
            };
            assert_eq!(sorted(runtime.networks_of(&name)), expected, "{}", name);
        }
        for i in 3..6 {
            assert_eq!(runtime.networks_of(&format!("cont_img{}", i)), vec!["net1"]);
        }

        assert_eq!(env.links.len(), 1);
        assert_eq!((env.links[0].from_group, env.links[0].to_group, env.links[0].node_index), (0, 1, 0));

        let connects: Vec<String> = runtime
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("connect_network"))
            .collect();
        assert_eq!(connects, vec!["connect_network net1 cont_img0"]);
    }

    /// All networks are created before any node, and every node before any link.
    #[test]
    fn test_phase_ordering() {
        let runtime = InMemoryRuntime::new();
        let topology = Topology::new(3, 2, 2, "img", "net");
        let matrix = AdjacencyMatrix::from_rows(vec![
            vec![false, true, true],
            vec![true, false, false],
            vec![false, true, false],
        ]);
        build(&topology, &matrix, &runtime, &NullSink).unwrap();

        let calls = runtime.calls();
        let last_network = calls.iter().rposition(|c| c.starts_with("create_network")).unwrap();
        let first_node = calls.iter().position(|c| c.starts_with("create_container")).unwrap();
        let last_node = calls.iter().rposition(|c| c.starts_with("start_container")).unwrap();
        let first_link = calls.iter().position(|c| c.starts_with("connect_network")).unwrap();
        assert!(last_network < first_node);
        assert!(last_node < first_link);
        // 4 linked pairs, 2 nodes each
        assert_eq!(calls.iter().filter(|c| c.starts_with("connect_network")).count(), 8);
    }

    #[test]
    fn test_single_group_skips_prompt_and_links() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let matrix = acquire(1, None, &mut input, &mut output).unwrap();
        assert!(output.is_empty());

        let runtime = InMemoryRuntime::new();
        let topology = Topology::new(1, 4, 1, "img", "net");
        let env = build(&topology, &matrix, &runtime, &NullSink).unwrap();
        assert!(env.links.is_empty());
        assert!(!runtime.calls().iter().any(|c| c.starts_with("connect_network")));
        assert_eq!(env.nodes.len(), 4);
    }

    #[test]
    fn test_interactive_matrix_drives_build() {
        // (0,1) yes, (1,0) no, then confirm
        let mut input = Cursor::new(b"y\nn\ny\n".to_vec());
        let mut output = Vec::new();
        let matrix = acquire(2, None, &mut input, &mut output).unwrap();
        assert_eq!(matrix, directed_pair());

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Do you want a link between network 1 and network 0 (Y/N): "));
        assert!(text.contains("Is the adjacency matrix correct?(Y/N): "));

        let runtime = InMemoryRuntime::new();
        build(&Topology::new(2, 2, 1, "img", "net"), &matrix, &runtime, &NullSink).unwrap();
        assert_eq!(runtime.networks_of("cont_img2"), vec!["net1"]);
    }

    #[test]
    fn test_invalid_topology_makes_no_runtime_calls() {
        let runtime = InMemoryRuntime::new();
        let too_many_links = Topology::new(2, 2, 3, "img", "net");
        assert!(matches!(
            build(&too_many_links, &directed_pair(), &runtime, &NullSink),
            Err(MeshError::InvalidTopology(_))
        ));

        let wrong_rows = Topology::new(3, 2, 1, "img", "net");
        assert!(matches!(
            build(&wrong_rows, &directed_pair(), &runtime, &NullSink),
            Err(MeshError::InvalidTopology(_))
        ));
        assert!(runtime.calls().is_empty());
    }

    #[test]
    fn test_teardown_twice_is_a_no_op() {
        let runtime = InMemoryRuntime::new();
        let topology = Topology::new(2, 3, 1, "img", "net");
        run_build(&runtime, &topology, &directed_pair(), BuildOptions::default(), |_| {}).unwrap();

        let first = run_teardown(&runtime, &topology, ReapOptions::default(), |_| {}).unwrap();
        assert_eq!(first.removed_containers.len(), 6);
        assert_eq!(first.removed_networks.len(), 2);
        assert!(runtime.container_names().is_empty());
        assert!(runtime.network_names().is_empty());

        runtime.clear_calls();
        let second = run_teardown(&runtime, &topology, ReapOptions::default(), |_| {}).unwrap();
        assert!(second.is_empty());
        assert!(runtime.calls().is_empty());
    }

    #[test]
    fn test_restart_requires_prior_stop() {
        let runtime = InMemoryRuntime::new();
        let topology = Topology::new(1, 3, 1, "img", "net");
        let env = build(&topology, &AdjacencyMatrix::empty(1), &runtime, &NullSink).unwrap();
        let mut tracker = LifecycleTracker::from_environment(&env);

        assert!(matches!(tracker.restart(1, &runtime), Err(MeshError::InvalidTransition { index: 1, .. })));
        assert_eq!(tracker.state(1), Some(NodeState::Running));

        tracker.stop(1, &runtime).unwrap();
        assert!(matches!(tracker.stop(1, &runtime), Err(MeshError::InvalidTransition { .. })));
        tracker.restart(1, &runtime).unwrap();
        assert_eq!(tracker.state(1), Some(NodeState::Running));
        assert!(runtime.is_running("cont_img1"));
    }

    #[test]
    fn test_stop_of_vanished_node_is_not_found() {
        let runtime = InMemoryRuntime::new();
        let topology = Topology::new(1, 2, 1, "img", "net");
        let env = build(&topology, &AdjacencyMatrix::empty(1), &runtime, &NullSink).unwrap();
        let mut session = Session::new(&runtime, env);

        runtime.remove_container("cont_img1", true).unwrap();
        assert!(matches!(session.stop_node(1), Err(MeshError::NodeNotFound { .. })));
        assert_eq!(session.status().stopped_containers, Vec::<usize>::new());
    }

    /// A build that stops halfway leaves resources behind; reaping by prefix
    /// cleans them and a rebuild with the same names succeeds.
    #[test]
    fn test_reap_recovers_after_failed_build() {
        let runtime = InMemoryRuntime::new();
        let topology = Topology::new(2, 3, 1, "img", "net");
        runtime.fail_on("create_container", "cont_img4");

        let err = build(&topology, &directed_pair(), &runtime, &NullSink).unwrap_err();
        assert_eq!(err.resource(), Some("cont_img4"));
        assert_eq!(runtime.container_names().len(), 4);

        let sink = RecordingSink::new();
        let report = reap(
            &|name: &str| name.starts_with("cont_img"),
            &|name: &str| name.starts_with("net"),
            &runtime,
            &sink,
            ReapOptions::default(),
        )
        .unwrap();
        assert_eq!(report.removed_containers.len(), 4);
        assert_eq!(report.removed_networks.len(), 2);
        assert_eq!(sink.messages().len(), 6);

        assert!(runtime.container_names().is_empty());
        runtime.clear_failures();
        let env = build(&topology, &directed_pair(), &runtime, &NullSink).unwrap();
        assert_eq!(env.nodes.len(), 6);
    }

    /// Substring matching also removes foreign resources containing the prefix.
    #[test]
    fn test_substring_reap_hits_lookalike_names() {
        let runtime = InMemoryRuntime::new();
        let topology = Topology::new(1, 1, 1, "img", "net");
        build(&topology, &AdjacencyMatrix::empty(1), &runtime, &NullSink).unwrap();
        runtime
            .create_container(&ContainerSpec {
                name: "backup_cont_img_data".to_string(),
                image: "other".to_string(),
                network: "net0".to_string(),
                command: Vec::new(),
                privileged: false,
            })
            .unwrap();
        runtime.create_network(&NetworkSpec::bridge("unrelated")).unwrap();

        let report = run_teardown(&runtime, &topology, ReapOptions::default(), |_| {}).unwrap();
        assert_eq!(sorted(report.removed_containers), vec!["backup_cont_img_data", "cont_img0"]);
        assert_eq!(runtime.network_names(), vec!["unrelated"]);
    }

    #[test]
    fn test_yaml_config_builds_mesh() {
        let yaml = r#"
ImageSettings:
  ImageName: "alpine"
NetworkSettings:
  NetworkName: "mesh"
  NumNetworks: 2
  NumContainers: 2
  NumLinks: 2
  NetMatrix:
    - [false, false]
    - [true, false]
RuntimeSettings:
  Privileged: true
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();
        let config = resolve_config(MeshConfig::default(), Some(temp_file.path())).unwrap();

        let topology = config.topology();
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let matrix = acquire(topology.group_count, config.supplied_matrix(), &mut input, &mut output).unwrap();
        assert!(output.is_empty());

        let runtime = InMemoryRuntime::new();
        run_build(&runtime, &topology, &matrix, config.build_options(), |_| {}).unwrap();
        assert_eq!(sorted(runtime.networks_of("cont_alpine2")), vec!["mesh0", "mesh1"]);
        assert_eq!(sorted(runtime.networks_of("cont_alpine3")), vec!["mesh0", "mesh1"]);
        assert_eq!(runtime.networks_of("cont_alpine0"), vec!["mesh0"]);
        assert!(runtime.is_privileged("cont_alpine0"));
    }

    #[test]
    fn test_parallel_build_matches_sequential_result() {
        let topology = Topology::new(3, 4, 1, "img", "net");
        let matrix = AdjacencyMatrix::from_rows(vec![
            vec![false, true, false],
            vec![false, false, true],
            vec![true, false, false],
        ]);

        let sequential = InMemoryRuntime::new();
        let a = run_build(&sequential, &topology, &matrix, BuildOptions::default(), |_| {}).unwrap();
        let parallel = InMemoryRuntime::new();
        let options = BuildOptions {
            parallel_groups: true,
            ..BuildOptions::default()
        };
        let b = run_build(&parallel, &topology, &matrix, options, |_| {}).unwrap();

        assert_eq!(sorted(sequential.container_names()), sorted(parallel.container_names()));
        assert_eq!(a.links, b.links);
        for i in 0..12 {
            let name = format!("cont_img{}", i);
            assert_eq!(sorted(sequential.networks_of(&name)), sorted(parallel.networks_of(&name)));
        }
    }
}
