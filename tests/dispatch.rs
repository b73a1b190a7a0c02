use bytes::{Bytes, BytesMut};
use embedis::*;

fn server() -> Server {
    build_server(&Settings::default()).unwrap()
}

fn run_as(s: &mut Server, slot: Option<Slot>, args: &[&str]) -> (String, Option<Publication>) {
    let argv: Vec<Bytes> = args.iter().map(|a| Bytes::copy_from_slice(a.as_bytes())).collect();
    let mut out = BytesMut::new();
    let p = s.exec(&argv, slot, &mut out);
    (String::from_utf8_lossy(&out).into_owned(), p)
}

fn run(s: &mut Server, args: &[&str]) -> String {
    run_as(s, None, args).0
}

#[test]
fn unknown_command_only_runs_default() {
    let mut s = server();
    run(&mut s, &["SELECT", "RAM"]);
    run(&mut s, &["SET", "k", "v"]);

    for name in ["PING", "get", "GETX", "SE", ""] {
        assert_eq!(
            run(&mut s, &[name, "k", "other"]),
            format!("-UNKNOWN unknown command '{}'\r\n", name)
        );
    }
    assert_eq!(run(&mut s, &["GET", "k"]), "$1\r\nv\r\n");
    assert_eq!(run(&mut s, &["KEYS"]), "*1\r\n$1\r\nk\r\n");
}

#[test]
fn commands_lists_table_in_order() {
    let mut s = server();
    let reply = run(&mut s, &["COMMANDS"]);
    assert!(reply.starts_with("*11\r\n$8\r\nCOMMANDS\r\n$6\r\nSELECT\r\n"));
    assert!(reply.ends_with("$11\r\nUNSUBSCRIBE\r\n"));
}

#[test]
fn rom_dictionary_is_read_only() {
    let mut s = server();
    assert_eq!(run(&mut s, &["SELECT", "ROM"]), "+OK\r\n");
    assert_eq!(run(&mut s, &["GET", "vendor"]), "$13\r\nPatternAgents\r\n");
    assert_eq!(run(&mut s, &["GET", "model"]), "-NOTFOUND key not found\r\n");
    assert_eq!(run(&mut s, &["SET", "vendor", "x"]), "-READONLY dictionary is read-only\r\n");
    assert_eq!(run(&mut s, &["DEL", "vendor"]), "-READONLY dictionary is read-only\r\n");
    assert_eq!(run(&mut s, &["KEYS"]), "*1\r\n$6\r\nvendor\r\n");
}

#[test]
fn ram_dictionary_set_get_del() {
    let mut s = server();
    assert_eq!(run(&mut s, &["SELECT", "RAM"]), "+OK\r\n");
    assert_eq!(run(&mut s, &["SET", "asset_identification", "A-17"]), "+OK\r\n");
    assert_eq!(run(&mut s, &["SET", "color", "red"]), "+OK\r\n");
    assert_eq!(run(&mut s, &["GET", "asset_identification"]), "$4\r\nA-17\r\n");
    assert_eq!(
        run(&mut s, &["KEYS"]),
        "*2\r\n$20\r\nasset_identification\r\n$5\r\ncolor\r\n"
    );
    assert_eq!(run(&mut s, &["DEL", "color"]), "+OK\r\n");
    assert_eq!(run(&mut s, &["DEL", "color"]), "-NOTFOUND key not found\r\n");
    assert_eq!(run(&mut s, &["GET", "color"]), "-NOTFOUND key not found\r\n");

    let big = "x".repeat(64);
    assert_eq!(run(&mut s, &["SET", "k", &big]), "-FULL not enough space in dictionary\r\n");
}

#[test]
fn ram_values_are_binary_safe() {
    let mut s = server();
    run(&mut s, &["SELECT", "RAM"]);
    let payload = Bytes::from_static(b"\0\r\n\xff\0");
    let argv = vec![Bytes::from_static(b"SET"), Bytes::from_static(b"bin"), payload.clone()];
    let mut out = BytesMut::new();
    s.exec(&argv, None, &mut out);
    assert_eq!(&out[..], b"+OK\r\n");

    out.clear();
    s.exec(&[Bytes::from_static(b"GET"), Bytes::from_static(b"bin")], None, &mut out);
    assert_eq!(&out[..], b"$5\r\n\0\r\n\xff\0\r\n");
}

#[test]
fn select_unknown_keeps_selection() {
    let mut s = server();
    run(&mut s, &["SELECT", "RAM"]);
    assert_eq!(run(&mut s, &["SELECT", "FRAM"]), "-NODICT no such dictionary\r\n");
    assert_eq!(s.dictionaries.current().name.as_str(), "RAM");
    assert_eq!(run(&mut s, &["SELECT"]), "*2\r\n$3\r\nROM\r\n$3\r\nRAM\r\n");
}

#[test]
fn repeated_select_is_idempotent() {
    let mut s = server();
    run(&mut s, &["SELECT", "RAM"]);
    run(&mut s, &["SET", "a", "1"]);
    for _ in 0..3 {
        assert_eq!(run(&mut s, &["SELECT", "RAM"]), "+OK\r\n");
    }
    assert_eq!(s.dictionaries.current().kind(), Kind::Ram);
    assert_eq!(run(&mut s, &["GET", "a"]), "$1\r\n1\r\n");
}

#[test]
fn key_index_resolves_configured_ids() {
    let s = server();
    assert_eq!(s.keys.resolve(b"asset_identification"), Some(1000));
    assert_eq!(s.keys.resolve(b"unmapped_key"), None);
}

#[test]
fn hardware_keys_route_to_handlers() {
    let mut s = server();
    assert_eq!(run(&mut s, &["READ", "mock0"]), "+0\r\n");
    assert_eq!(run(&mut s, &["READ", "mock1"]), "+1\r\n");
    assert_eq!(run(&mut s, &["WRITE", "mock0", "anything"]), "+OK\r\n");
    assert_eq!(run(&mut s, &["WRITE", "mock1", ""]), "+OK\r\n");
    assert_eq!(run(&mut s, &["READ", "mock2"]), "-NOTFOUND key not found\r\n");
    assert_eq!(run(&mut s, &["WRITE", "sensor", "1"]), "-NOTFOUND key not found\r\n");
    assert_eq!(
        run(&mut s, &["READ"]),
        "-ARGS wrong number of arguments for 'READ'\r\n"
    );
}

#[test]
fn publish_reaches_subscribers_only() {
    let mut s = server();
    let seven = Slot::new(7);

    assert_eq!(run_as(&mut s, seven, &["SUBSCRIBE", "temperature"]).0, "+OK\r\n");
    let (reply, p) = run_as(&mut s, None, &["PUBLISH", "temperature", "21.5"]);
    assert_eq!(reply, ":1\r\n");
    let p = p.expect("publication");
    assert!(p.subscribers.contains(seven.unwrap()));
    assert_eq!(&p.payload[..], b"21.5");

    let mut frame = BytesMut::new();
    p.encode(&mut frame);
    assert_eq!(&frame[..], b"*3\r\n$7\r\nmessage\r\n$11\r\ntemperature\r\n$4\r\n21.5\r\n");

    assert_eq!(run_as(&mut s, seven, &["UNSUBSCRIBE", "temperature"]).0, "+OK\r\n");
    let (reply, p) = run_as(&mut s, None, &["PUBLISH", "temperature", "22"]);
    assert_eq!(reply, ":0\r\n");
    assert!(p.is_none());
}

#[test]
fn unknown_channel_changes_nothing() {
    let mut s = server();
    let slot = Slot::new(1);
    run_as(&mut s, slot, &["SUBSCRIBE", "humidity"]);

    let err = "-NOCHANNEL no such channel\r\n";
    assert_eq!(run_as(&mut s, slot, &["SUBSCRIBE", "temperature", "pressure"]).0, err);
    assert_eq!(run_as(&mut s, slot, &["UNSUBSCRIBE", "humidity", "pressure"]).0, err);
    let (reply, p) = run_as(&mut s, slot, &["PUBLISH", "pressure", "1013"]);
    assert_eq!(reply, err);
    assert!(p.is_none());

    assert!(s.pubsub.subscribers_of(0).is_empty());
    assert_eq!(s.pubsub.subscribers_of(1).len(), 1);
}

#[test]
fn subscribe_needs_a_slot() {
    let mut s = server();
    assert_eq!(
        run(&mut s, &["SUBSCRIBE", "temperature"]),
        "-NOSLOT no subscriber slot available\r\n"
    );
}

#[test]
fn custom_tables_replace_defaults() {
    fn ping(_: &mut Server, req: &mut Request<'_>) {
        req.respond_simple("PONG");
    }
    fn dynamic_command(_: &mut Server, req: &mut Request<'_>) {
        let name = req.command();
        req.respond_simple(&name.to_lowercase());
    }

    let mut s = server();
    s.commands = CommandTable::new(dynamic_command).with("PING", ping);
    assert_eq!(run(&mut s, &["PING"]), "+PONG\r\n");
    assert_eq!(run(&mut s, &["HELLO"]), "+hello\r\n");
}
