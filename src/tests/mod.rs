mod address;
mod stack;
