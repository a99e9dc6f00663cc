fn main() -> anyhow::Result<()> {
    switchyard::run()
}
