fn main() -> Result<(), anyhow::Error> {
    globalgpt_lib::run()
}
