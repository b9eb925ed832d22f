use anyhow::Result;
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use super::pipeline::run_pipeline;
use super::runtime::{frames_socket_path, socket_path};
use crate::config::DaemonConfigState;
use crate::session::SessionAggregator;

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut state = DaemonConfigState::load_or_install_default()?;
    info!("daemon: active profile '{}'", state.active_name);

    let aggregator = Arc::new(Mutex::new(SessionAggregator::new(
        state.profile.thresholds.clone(),
    )));

    // termination
    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, term.clone())?;
    signal_hook::flag::register(SIGINT, term.clone())?;

    // frame pipeline thread
    {
        let agg = aggregator.clone();
        thread::spawn(move || {
            if let Err(e) = run_pipeline(agg) {
                error!("frame pipeline failed: {e}");
            }
        });
    }

    // channel for ops that mutate the config
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if term.load(Ordering::Relaxed) {
            info!("daemon: signal received, shutting down");
            break;
        }

        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx_req.clone();
                let st = state.clone();
                let agg = aggregator.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, st, agg, tx) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(_) => {}
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => {
                    if let Err(e) = state.reload() {
                        error!("reload failed, keeping previous profile: {e}");
                    } else {
                        let th = state.profile.thresholds.clone();
                        aggregator.lock().unwrap().apply_thresholds(th);
                        info!("profile reloaded");
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = state.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        let th = state.profile.thresholds.clone();
                        aggregator.lock().unwrap().apply_thresholds(th);
                        info!("switched active profile to {}", state.active_name);
                    }
                }
                IpcMsg::Shutdown => {
                    cleanup_sockets();
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }

    cleanup_sockets();
    Ok(())
}

fn cleanup_sockets() {
    let _ = std::fs::remove_file(socket_path());
    let _ = std::fs::remove_file(frames_socket_path());
}

fn handle_client(
    mut stream: UnixStream,
    st: DaemonConfigState,
    aggregator: Arc<Mutex<SessionAggregator>>,
    tx_req: mpsc::Sender<IpcMsg>,
) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => {
            let snap = aggregator.lock().unwrap().snapshot();
            let primary = snap
                .primary()
                .map(|(id, s)| serde_json::json!({"id": id, "jumps": s.jumps, "stage": s.stage}));
            serde_json::json!({"ok": true, "data": {
                "active_profile": st.active_name,
                "socket": socket_path(),
                "frames_socket": frames_socket_path(),
                "tracked_people": snap.people.len(),
                "primary": primary,
            }})
        }
        "snapshot" => {
            let snap = aggregator.lock().unwrap().snapshot();
            serde_json::json!({"ok": true, "data": snap})
        }
        "reset" => {
            aggregator.lock().unwrap().reset();
            serde_json::json!({"ok": true, "data": "counters cleared"})
        }
        // reload/use validate here so the client sees the failure; the
        // daemon loop only ever applies a profile that already parsed.
        "reload" => match st.check_profile(&st.active_name) {
            Ok(()) => {
                let _ = tx_req.send(IpcMsg::Reload);
                serde_json::json!({"ok": true, "data": {"active_profile": st.active_name}})
            }
            Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
        },
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            match st.check_profile(name) {
                Ok(()) => {
                    let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
                    serde_json::json!({"ok": true, "data": {"active_profile": name}})
                }
                Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
            }
        }
        "list" => {
            let list = st.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.active_name}})
        }
        "doctor" => {
            let report = st.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            let _ = write!(
                stream,
                "{}\n",
                serde_json::json!({"ok": true, "data": "shutting down"})
            );
            return Ok(());
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    write!(stream, "{}\n", resp)?;
    Ok(())
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    Shutdown,
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow::anyhow!(
            "jackcount daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
