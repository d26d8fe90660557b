//! Integration tests for backend selection and the fallback chain.
//!
//! A minimal echo kernel (no imports; `execute` copies the program into
//! the output buffer) is assembled with `wasm-encoder` for the native
//! path; remote-proxy behavior is driven against a raw TCP stub and
//! against a connection-refused endpoint.

use std::time::Duration;

use sunbird_bridge::{
    Backend, BackendKind, Bridge, BridgeConfig, BundleStatus, RemoteConfig, RemoteProxy,
    StaticFallback, LOCAL_FALLBACK_NOTE,
};
use sunbird_kernel::ModuleSource;
use sunbird_types::{KernelControls, TurnRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, ExportKind, ExportSection, Function, FunctionSection,
    GlobalSection, GlobalType, Instruction, MemArg, MemorySection, MemoryType, Module,
    TypeSection, ValType,
};

// ══════════════════════════════════════════════════════════════════════════════
// Echo kernel fixture
// ══════════════════════════════════════════════════════════════════════════════

const TYPE_VOID_I32: u32 = 0;
const TYPE_I32_I32: u32 = 1;
const TYPE_I32_VOID: u32 = 2;
const TYPE_I32X7_I32: u32 = 3;
const TYPE_I32X3_I32: u32 = 4;

fn memarg(offset: u64, align: u32) -> MemArg {
    MemArg {
        offset,
        align,
        memory_index: 0,
    }
}

fn const_result(value: i32) -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::I32Const(value));
    f.instruction(&Instruction::End);
    f
}

/// Bump allocator over global 0.
fn echo_alloc() -> Function {
    let mut f = Function::new(vec![(1, ValType::I32)]);
    f.instruction(&Instruction::GlobalGet(0));
    f.instruction(&Instruction::LocalSet(1));
    f.instruction(&Instruction::GlobalGet(0));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Const(7));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(-8));
    f.instruction(&Instruction::I32And);
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::GlobalSet(0));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::End);
    f
}

/// Copies the NUL-terminated program into the output buffer.
fn echo_execute() -> Function {
    // params: 0 input, 1 output, 2 capacity; locals: 3 len, 4 n
    let mut f = Function::new(vec![(2, ValType::I32)]);
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::LocalSet(3));
    f.instruction(&Instruction::Block(BlockType::Empty));
    f.instruction(&Instruction::Loop(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Load8U(memarg(0, 0)));
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::BrIf(1));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(3));
    f.instruction(&Instruction::Br(0));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::LocalSet(4));
    f.instruction(&Instruction::LocalGet(4));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32GtS);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalSet(4));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(4));
    f.instruction(&Instruction::MemoryCopy {
        src_mem: 0,
        dst_mem: 0,
    });
    f.instruction(&Instruction::LocalGet(4));
    f.instruction(&Instruction::End);
    f
}

fn echo_kernel_module() -> Vec<u8> {
    let mut module = Module::new();

    let mut types = TypeSection::new();
    types.ty().function(vec![], vec![ValType::I32]);
    types.ty().function(vec![ValType::I32], vec![ValType::I32]);
    types.ty().function(vec![ValType::I32], vec![]);
    types
        .ty()
        .function(vec![ValType::I32; 7], vec![ValType::I32]);
    types
        .ty()
        .function(vec![ValType::I32; 3], vec![ValType::I32]);
    module.section(&types);

    let mut functions = FunctionSection::new();
    functions.function(TYPE_I32_I32); // 0: alloc
    functions.function(TYPE_I32_VOID); // 1: free
    functions.function(TYPE_VOID_I32); // 2: init
    functions.function(TYPE_VOID_I32); // 3: reset
    functions.function(TYPE_I32X7_I32); // 4: configure
    functions.function(TYPE_I32X3_I32); // 5: execute
    module.section(&functions);

    let mut memory = MemorySection::new();
    memory.memory(MemoryType {
        minimum: 16,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memory);

    let mut globals = GlobalSection::new();
    globals.global(
        GlobalType {
            val_type: ValType::I32,
            mutable: true,
            shared: false,
        },
        &ConstExpr::i32_const(1024),
    );
    module.section(&globals);

    let mut exports = ExportSection::new();
    exports.export("memory", ExportKind::Memory, 0);
    exports.export("sunbird_kernel_alloc", ExportKind::Func, 0);
    exports.export("sunbird_kernel_free", ExportKind::Func, 1);
    exports.export("sunbird_kernel_init", ExportKind::Func, 2);
    exports.export("sunbird_kernel_reset", ExportKind::Func, 3);
    exports.export("sunbird_kernel_configure", ExportKind::Func, 4);
    exports.export("sunbird_kernel_execute", ExportKind::Func, 5);
    module.section(&exports);

    let mut code = CodeSection::new();
    code.function(&echo_alloc());
    {
        let mut free = Function::new(vec![]);
        free.instruction(&Instruction::End);
        code.function(&free);
    }
    code.function(&const_result(0)); // init
    code.function(&const_result(0)); // reset
    code.function(&const_result(0)); // configure
    code.function(&echo_execute());
    module.section(&code);

    let bytes = module.finish();
    wasmparser::validate(&bytes).expect("echo kernel must validate");
    bytes
}

fn native_config() -> BridgeConfig {
    BridgeConfig::new(ModuleSource::Bytes(echo_kernel_module()))
}

/// One-connection-at-a-time HTTP stub answering with a fixed response.
async fn spawn_http_stub(response: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut request = vec![0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}/infer")
}

fn quick_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client")
}

// ══════════════════════════════════════════════════════════════════════════════
// Backend selection
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_native_backend_answers_turns() {
    let bridge = Bridge::new(native_config());
    let turn = TurnRequest::new("what is a sunbird?").with_snippet("field-guide", "a small bird");
    let answer = bridge.ask(&turn).await.expect("native ask");
    // The echo kernel returns the rendered program.
    assert!(answer.contains("question: what is a sunbird?"));
    assert!(answer.contains("teach question -> \"a small bird\""));
    assert_eq!(bridge.backend().await.kind(), BackendKind::Native);
}

#[tokio::test]
async fn test_native_capabilities_without_probes() {
    let bridge = Bridge::new(native_config());
    let caps = bridge.capabilities().await;
    assert!(caps.has_native_module);
    assert!(!caps.has_vector_extension);
    assert_eq!(caps.vector_lane_width, 1);
}

#[tokio::test]
async fn test_configure_and_reset_through_bridge() {
    let bridge = Bridge::new(native_config());
    bridge
        .configure(&KernelControls::default())
        .await
        .expect("configure");
    bridge.reset().await.expect("reset");
}

#[tokio::test]
async fn test_stub_bundle_skips_loader_and_embeds_reason() {
    // The module itself is perfectly loadable; the build verdict alone
    // must route to the static fallback.
    let config = native_config().with_bundle(BundleStatus::Stub("stub marker xyzzy".into()));
    let bridge = Bridge::new(config);
    let answer = bridge.ask(&TurnRequest::new("hello")).await.expect("ask");
    assert!(answer.contains("stub marker xyzzy"));
    assert_eq!(bridge.backend().await.kind(), BackendKind::Static);
}

#[tokio::test]
async fn test_load_failure_selects_static_fallback() {
    let config = BridgeConfig::new(ModuleSource::Path("/nonexistent/kernel.wasm".into()));
    let bridge = Bridge::new(config);
    let answer = bridge.ask(&TurnRequest::new("hello")).await.expect("ask");
    assert!(answer.contains("unavailable"));
    assert_eq!(bridge.backend().await.kind(), BackendKind::Static);
}

#[tokio::test]
async fn test_selection_is_memoized() {
    let bridge = Bridge::new(BridgeConfig::new(ModuleSource::Path(
        "/nonexistent/kernel.wasm".into(),
    )));
    let first = bridge.ask(&TurnRequest::new("one")).await.expect("ask");
    let second = bridge.ask(&TurnRequest::new("two")).await.expect("ask");
    // The static fallback answers identically forever; no re-probe.
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_injected_backend_is_used_verbatim() {
    let bridge = Bridge::with_backend(Backend::Static(StaticFallback::new("injected for test")));
    let answer = bridge.ask(&TurnRequest::new("q")).await.expect("ask");
    assert!(answer.contains("injected for test"));
}

#[tokio::test]
async fn test_sidecar_diagnostics_enrich_fallback() {
    let path = std::env::temp_dir().join(format!("sunbird-sidecar-{}.txt", std::process::id()));
    std::fs::write(&path, "linker exited with code 1").expect("write sidecar");
    let config = native_config()
        .with_bundle(BundleStatus::Missing("bundle step skipped".into()))
        .with_diagnostic_sidecar(path.display().to_string());
    let bridge = Bridge::new(config);
    let answer = bridge.ask(&TurnRequest::new("q")).await.expect("ask");
    let _ = std::fs::remove_file(&path);
    assert!(answer.contains("bundle step skipped"));
    assert!(answer.contains("linker exited with code 1"));
}

#[tokio::test]
async fn test_concurrent_asks_do_not_cross_contaminate() {
    let bridge = Bridge::new(native_config());
    let alpha = TurnRequest::new("alpha question");
    let beta = TurnRequest::new("beta question");
    let (a, b) = tokio::join!(bridge.ask(&alpha), bridge.ask(&beta));
    let a = a.expect("alpha");
    let b = b.expect("beta");
    assert!(a.contains("alpha question"));
    assert!(!a.contains("beta question"));
    assert!(b.contains("beta question"));
    assert!(!b.contains("alpha question"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Remote proxy
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_remote_answer_is_used_when_endpoint_works() {
    let endpoint = spawn_http_stub(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 27\r\nconnection: close\r\n\r\n{\"answer\":\"remote says hi\"}",
    )
    .await;
    let proxy = RemoteProxy::new(
        endpoint,
        quick_client(),
        Backend::Static(StaticFallback::new("delegate")),
    );
    let answer = proxy.ask(&TurnRequest::new("q")).await.expect("ask");
    assert_eq!(answer, "remote says hi");
}

#[tokio::test]
async fn test_refused_connection_falls_back_to_delegate_with_note() {
    let proxy = RemoteProxy::new(
        "http://127.0.0.1:9/infer",
        quick_client(),
        Backend::Static(StaticFallback::new("local delegate reason")),
    );
    let answer = proxy.ask(&TurnRequest::new("q")).await.expect("ask");
    assert!(answer.contains("local delegate reason"));
    assert!(answer.ends_with(LOCAL_FALLBACK_NOTE));
}

#[tokio::test]
async fn test_malformed_payload_falls_back_to_delegate() {
    let endpoint = spawn_http_stub(
        "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 9\r\nconnection: close\r\n\r\nnot json!",
    )
    .await;
    let proxy = RemoteProxy::new(
        endpoint,
        quick_client(),
        Backend::Static(StaticFallback::new("delegate answer")),
    );
    let answer = proxy.ask(&TurnRequest::new("q")).await.expect("ask");
    assert!(answer.contains("delegate answer"));
    assert!(answer.ends_with(LOCAL_FALLBACK_NOTE));
}

#[tokio::test]
async fn test_error_status_falls_back_to_delegate() {
    let endpoint = spawn_http_stub(
        "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
    )
    .await;
    let proxy = RemoteProxy::new(
        endpoint,
        quick_client(),
        Backend::Static(StaticFallback::new("delegate answer")),
    );
    let answer = proxy.ask(&TurnRequest::new("q")).await.expect("ask");
    assert!(answer.ends_with(LOCAL_FALLBACK_NOTE));
}

#[tokio::test]
async fn test_remote_mode_wraps_native_backend() {
    let config = native_config().with_remote(RemoteConfig {
        endpoint: "http://127.0.0.1:9/infer".into(),
        timeout_ms: 2000,
    });
    let bridge = Bridge::new(config);
    assert_eq!(bridge.backend().await.kind(), BackendKind::Remote);
    // Remote is unreachable, so the native delegate answers with the note.
    let answer = bridge
        .ask(&TurnRequest::new("delegated question"))
        .await
        .expect("ask");
    assert!(answer.contains("delegated question"));
    assert!(answer.ends_with(LOCAL_FALLBACK_NOTE));
    // Capabilities surface the delegate's report.
    assert!(bridge.capabilities().await.has_native_module);
}

#[tokio::test]
async fn test_remote_proxy_never_fails_outright() {
    let proxy = RemoteProxy::new(
        "http://127.0.0.1:9/infer",
        quick_client(),
        Backend::Static(StaticFallback::new("backstop")),
    );
    for _ in 0..3 {
        let answer = proxy.ask(&TurnRequest::new("q")).await.expect("ask");
        assert!(!answer.is_empty());
    }
}
