//! End-to-end indexing tests over fixture trees

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use arbor_core::index::Index;
use arbor_core::model::{NodeKind, Scope, TypeSource};
use arbor_core::status::{IndexState, StatusTracker};

use crate::pipeline::{IndexerConfig, build_index};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn index_fixture(setup: impl Fn(&Path)) -> Index {
    let dir = TempDir::new().unwrap();
    setup(dir.path());
    let status = StatusTracker::new();
    let index = build_index(&IndexerConfig::new(dir.path()), &status).unwrap();
    assert!(status.is_ready());
    index
}

#[test]
fn functions_and_callers_across_modules() {
    let index = index_fixture(|root| {
        write(root, "myapp/__init__.py", "");
        write(root, "myapp/auth.py", "def validate_user():\n    return True\n");
        write(
            root,
            "myapp/views.py",
            "def login():\n    validate_user()\n",
        );
    });

    let func = index.call_graph.function("myapp.auth.validate_user").unwrap();
    assert_eq!(func.kind, NodeKind::Function);
    assert_eq!(func.line, 1);

    let callers = index.call_graph.callers("myapp.auth.validate_user");
    assert_eq!(callers, ["myapp.views.login"]);
    let callees = index.call_graph.callees("myapp.views.login");
    assert_eq!(callees, ["myapp.auth.validate_user"]);

    let sites = index.call_graph.call_sites_of("myapp.views.login");
    assert_eq!(sites.len(), 1);
    assert!(sites[0].resolved);
    assert_eq!(sites[0].target_name, "validate_user");
    assert_eq!(sites[0].line, 2);
}

#[test]
fn constants_scope_to_their_owner() {
    let index = index_fixture(|root| {
        write(
            root,
            "data_manager/prepare_params.py",
            "class Column:\n    ID = 1\n    name = \"col\"\n",
        );
        write(root, "core/settings.py", "DEBUG = True\nretries = 3\n");
    });

    let class_const = index
        .code_graph
        .node("data_manager.prepare_params.Column.ID")
        .unwrap();
    assert_eq!(class_const.kind, NodeKind::Constant);
    assert_eq!(class_const.scope, Scope::Class);

    let module_const = index.code_graph.node("core.settings.DEBUG").unwrap();
    assert_eq!(module_const.kind, NodeKind::Constant);
    assert_eq!(module_const.scope, Scope::Module);

    // Lowercase assignments are plain variables/fields.
    assert_eq!(
        index
            .code_graph
            .node("data_manager.prepare_params.Column.name")
            .unwrap()
            .kind,
        NodeKind::ClassField
    );
    assert_eq!(
        index.code_graph.node("core.settings.retries").unwrap().kind,
        NodeKind::ModuleVariable
    );
}

#[test]
fn method_classification() {
    let index = index_fixture(|root| {
        write(
            root,
            "shop/models.py",
            concat!(
                "class Order:\n",
                "    def __init__(self, total: int):\n",
                "        self.total = total\n",
                "    def __repr__(self):\n",
                "        return \"order\"\n",
                "    @property\n",
                "    def summary(self):\n",
                "        return self.total\n",
                "    def close(self):\n",
                "        pass\n",
            ),
        );
    });

    let graph = &index.call_graph;
    assert_eq!(
        graph.function("shop.models.Order.__init__").unwrap().kind,
        NodeKind::Constructor
    );
    assert_eq!(
        graph.function("shop.models.Order.__repr__").unwrap().kind,
        NodeKind::SpecialMethod
    );
    assert_eq!(
        graph.function("shop.models.Order.summary").unwrap().kind,
        NodeKind::Property
    );
    assert_eq!(
        graph.function("shop.models.Order.close").unwrap().kind,
        NodeKind::Method
    );

    // self.total from __init__ lands in the attribute registry, typed from
    // the annotated parameter.
    let attr = index.attributes.attribute("shop.models.Order", "total").unwrap();
    assert_eq!(attr.assigned_in.as_deref(), Some("__init__"));
    assert_eq!(attr.ty.as_ref().unwrap().fqn(), Some("int"));
}

#[test]
fn class_kinds_from_decorators_and_bases() {
    let index = index_fixture(|root| {
        write(
            root,
            "app/types.py",
            concat!(
                "from dataclasses import dataclass\n",
                "from enum import Enum\n",
                "from typing import Protocol\n",
                "@dataclass\n",
                "class Point:\n",
                "    x: int = 0\n",
                "class Color(Enum):\n",
                "    RED = 1\n",
                "class Repo(Protocol):\n",
                "    def get(self):\n",
                "        ...\n",
                "class Base:\n",
                "    pass\n",
                "class Impl(Base):\n",
                "    pass\n",
            ),
        );
    });

    let code = &index.code_graph;
    assert_eq!(code.node("app.types.Point").unwrap().kind, NodeKind::Dataclass);
    assert_eq!(code.node("app.types.Color").unwrap().kind, NodeKind::Enum);
    assert_eq!(code.node("app.types.Repo").unwrap().kind, NodeKind::Interface);
    assert_eq!(code.node("app.types.Impl").unwrap().kind, NodeKind::Class);
    assert_eq!(
        code.node("app.types.Impl").unwrap().superclass.as_deref(),
        Some("Base")
    );
    // Enum members are class-scoped constants.
    assert_eq!(
        code.node("app.types.Color.RED").unwrap().kind,
        NodeKind::Constant
    );
}

#[test]
fn self_and_instance_calls_resolve() {
    let index = index_fixture(|root| {
        write(
            root,
            "svc/user.py",
            concat!(
                "class UserRepo:\n",
                "    def fetch(self, uid):\n",
                "        return uid\n",
                "class UserService:\n",
                "    def __init__(self):\n",
                "        self.repo = UserRepo()\n",
                "    def load(self, uid):\n",
                "        return self.repo.fetch(uid)\n",
                "    def run(self, uid):\n",
                "        return self.load(uid)\n",
            ),
        );
    });

    let graph = &index.call_graph;

    // self.load(...) resolves through the self type.
    let run_sites = graph.call_sites_of("svc.user.UserService.run");
    assert_eq!(run_sites.len(), 1);
    assert_eq!(run_sites[0].target_fqn, "svc.user.UserService.load");
    assert_eq!(run_sites[0].type_source, Some(TypeSource::SelfType));

    // self.repo.fetch(...) resolves through the attribute registry chain.
    let load_sites = graph.call_sites_of("svc.user.UserService.load");
    assert_eq!(load_sites.len(), 1);
    assert!(load_sites[0].resolved);
    assert_eq!(load_sites[0].target_fqn, "svc.user.UserRepo.fetch");
    assert_eq!(load_sites[0].inferred_type.as_deref(), Some("svc.user.UserRepo"));

    // UserRepo() resolves to the constructor... which UserRepo lacks, so the
    // site records the reason but still carries the instance type.
    let init_sites = graph.call_sites_of("svc.user.UserService.__init__");
    assert_eq!(init_sites.len(), 1);
    assert!(!init_sites[0].resolved);
    assert!(
        init_sites[0]
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("no constructor")
    );
    assert_eq!(init_sites[0].inferred_type.as_deref(), Some("svc.user.UserRepo"));
}

#[test]
fn annotated_locals_and_inline_instantiation() {
    let index = index_fixture(|root| {
        write(
            root,
            "flow/main.py",
            concat!(
                "class Engine:\n",
                "    def __init__(self):\n",
                "        self.ready = True\n",
                "    def start(self):\n",
                "        pass\n",
                "def boot():\n",
                "    engine: Engine = make()\n",
                "    engine.start()\n",
                "def kick():\n",
                "    Engine().start()\n",
                "def make():\n",
                "    return Engine()\n",
            ),
        );
    });

    let graph = &index.call_graph;

    // Annotated local resolves the method call.
    let boot_sites = graph.call_sites_of("flow.main.boot");
    let start = boot_sites
        .iter()
        .find(|s| s.target_name == "start")
        .unwrap();
    assert!(start.resolved);
    assert_eq!(start.target_fqn, "flow.main.Engine.start");
    assert_eq!(start.inferred_type.as_deref(), Some("flow.main.Engine"));

    // Inline instantiation: the inner Engine() call and the chained .start().
    let kick_sites = graph.call_sites_of("flow.main.kick");
    assert_eq!(kick_sites.len(), 2);
    let chained = kick_sites
        .iter()
        .find(|s| s.target_name == "start")
        .unwrap();
    assert_eq!(chained.target_fqn, "flow.main.Engine.start");
    let ctor = kick_sites
        .iter()
        .find(|s| s.target_name == "Engine")
        .unwrap();
    assert!(ctor.resolved);
    assert_eq!(ctor.target_fqn, "flow.main.Engine.__init__");
}

#[test]
fn unresolved_receiver_reports_reason() {
    let index = index_fixture(|root| {
        write(
            root,
            "misc/loose.py",
            "def handler(payload):\n    payload.deliver()\n",
        );
    });

    let sites = index.call_graph.call_sites_of("misc.loose.handler");
    assert_eq!(sites.len(), 1);
    assert!(!sites[0].resolved);
    assert_eq!(sites[0].failure_reason.as_deref(), Some("receiver type unknown"));
}

#[test]
fn module_function_calls_and_missing_modules() {
    let index = index_fixture(|root| {
        write(root, "pkg/util.py", "def helper():\n    return 1\n");
        write(
            root,
            "pkg/main.py",
            concat!(
                "import pkg.util\n",
                "import requests\n",
                "def go():\n",
                "    pkg.util.helper()\n",
                "def fetch():\n",
                "    requests.get(\"http://x\")\n",
            ),
        );
    });

    let go_sites = index.call_graph.call_sites_of("pkg.main.go");
    assert_eq!(go_sites.len(), 1);
    assert!(go_sites[0].resolved);
    assert_eq!(go_sites[0].target_fqn, "pkg.util.helper");

    let fetch_sites = index.call_graph.call_sites_of("pkg.main.fetch");
    assert_eq!(fetch_sites.len(), 1);
    assert!(!fetch_sites[0].resolved);
    assert!(
        fetch_sites[0]
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("not in project")
    );
}

#[test]
fn ambiguous_short_name_tie_breaks_to_same_module() {
    let index = index_fixture(|root| {
        write(root, "a/work.py", "def run():\n    pass\ndef go():\n    run()\n");
        write(root, "b/work.py", "def run():\n    pass\n");
    });

    let sites = index.call_graph.call_sites_of("a.work.go");
    assert_eq!(sites.len(), 1);
    assert!(sites[0].resolved);
    assert_eq!(sites[0].target_fqn, "a.work.run");
}

#[test]
fn statement_entities_are_recorded() {
    let index = index_fixture(|root| {
        write(
            root,
            "st/loops.py",
            concat!(
                "def scan(items):\n",
                "    for item in items:\n",
                "        if not item:\n",
                "            continue\n",
                "        if item == 0:\n",
                "            break\n",
                "    assert items\n",
                "    return items\n",
            ),
        );
    });

    let kinds: Vec<NodeKind> = index
        .code_graph
        .nodes()
        .filter(|n| n.fqn.starts_with("st.loops.scan."))
        .map(|n| n.kind)
        .collect();
    assert!(kinds.contains(&NodeKind::BreakStmt));
    assert!(kinds.contains(&NodeKind::ContinueStmt));
    assert!(kinds.contains(&NodeKind::AssertStmt));
    assert!(kinds.contains(&NodeKind::ReturnStmt));
}

#[test]
fn java_symbols_are_extracted() {
    let index = index_fixture(|root| {
        write(
            root,
            "com/acme/Greeter.java",
            concat!(
                "public class Greeter implements Speaker {\n",
                "    private static final int LIMIT = 3;\n",
                "    private String name;\n",
                "    public Greeter(String name) { this.name = name; }\n",
                "    public String greet() { return name; }\n",
                "}\n",
            ),
        );
    });

    let class = index.code_graph.node("com.acme.Greeter.Greeter").unwrap();
    assert_eq!(class.kind, NodeKind::Class);
    assert_eq!(class.interfaces, vec!["Speaker".to_string()]);
    assert_eq!(
        index
            .code_graph
            .node("com.acme.Greeter.Greeter.LIMIT")
            .unwrap()
            .kind,
        NodeKind::Constant
    );
    assert_eq!(
        index
            .code_graph
            .node("com.acme.Greeter.Greeter.name")
            .unwrap()
            .kind,
        NodeKind::ClassField
    );
    assert_eq!(
        index
            .call_graph
            .function("com.acme.Greeter.Greeter.greet")
            .unwrap()
            .kind,
        NodeKind::Method
    );
    assert_eq!(
        index
            .call_graph
            .function("com.acme.Greeter.Greeter.Greeter")
            .unwrap()
            .kind,
        NodeKind::Constructor
    );
}

#[test]
fn docker_and_compose_enter_the_code_graph() {
    let index = index_fixture(|root| {
        write(
            root,
            "Dockerfile",
            "FROM python:3.11\nUSER root\nEXPOSE 8000\n",
        );
        write(
            root,
            "docker-compose.yml",
            "services:\n  web:\n    image: nginx\n    depends_on:\n      - api\n  api:\n    build: .\n",
        );
    });

    let instructions: Vec<_> = index
        .code_graph
        .nodes()
        .filter(|n| n.kind == NodeKind::DockerInstruction)
        .collect();
    assert_eq!(instructions.len(), 3);

    let services: Vec<_> = index
        .code_graph
        .nodes()
        .filter(|n| n.kind == NodeKind::ComposeService)
        .collect();
    assert_eq!(services.len(), 2);
}

#[test]
fn syntax_errors_skip_the_file_not_the_build() {
    let index = index_fixture(|root| {
        write(root, "ok.py", "def fine():\n    pass\n");
        write(root, "broken.py", "def broken(:\n");
    });
    assert!(index.call_graph.function("ok.fine").is_some());
    // The broken file contributes no symbols but indexing still succeeded.
}

#[test]
fn indexing_twice_is_deterministic() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "m/a.py", "def f():\n    g()\ndef g():\n    pass\n");
    write(dir.path(), "m/b.py", "X = 1\n");

    let build = || {
        let status = StatusTracker::new();
        build_index(&IndexerConfig::new(dir.path()), &status).unwrap()
    };
    let first = build();
    let second = build();
    assert_eq!(
        serde_json::to_value(&first.call_graph).unwrap(),
        serde_json::to_value(&second.call_graph).unwrap()
    );
    assert_eq!(
        serde_json::to_value(&first.code_graph).unwrap(),
        serde_json::to_value(&second.code_graph).unwrap()
    );
}

#[test]
fn missing_root_fails_and_marks_tracker() {
    let status = StatusTracker::new();
    let result = build_index(&IndexerConfig::new("/definitely/not/here"), &status);
    assert!(result.is_err());
    assert_eq!(status.snapshot().state, IndexState::Failed);
    assert!(status.snapshot().error.is_some());
}
