mod average;
