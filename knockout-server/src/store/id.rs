use snowflaked::sync::Generator;

const INSTANCE: u16 = 0;

pub static USER: Generator = Generator::new_unchecked(INSTANCE);
pub static PARTICIPANT: Generator = Generator::new_unchecked(INSTANCE);
pub static BRACKET: Generator = Generator::new_unchecked(INSTANCE);
pub static MATCH: Generator = Generator::new_unchecked(INSTANCE);
