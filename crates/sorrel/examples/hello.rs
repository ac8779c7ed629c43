fn main() {
    env_logger::init();

    sorrel::config()
        .with_port(8080)
        .with_nodelay()
        .run(|conn: sorrel::Conn| async move { conn.ok("hello from sorrel") });
}
